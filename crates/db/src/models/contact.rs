//! Contact row model.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use rapport_core::contact::Contact;
use rapport_core::types::{DbId, Timestamp};

/// A row from the `contacts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContactRow {
    pub id: DbId,
    pub firstname: String,
    pub lastname: String,
    pub nickname: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub birthday: Option<NaiveDate>,
    pub address: String,
    pub how_we_met: String,
    pub food_preference: String,
    pub work_information: String,
    pub contact_information: String,
    /// `TEXT[]`, never NULL.
    pub circles: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            firstname: row.firstname,
            lastname: row.lastname,
            nickname: row.nickname,
            gender: row.gender,
            email: row.email,
            phone: row.phone,
            birthday: row.birthday,
            address: row.address,
            how_we_met: row.how_we_met,
            food_preference: row.food_preference,
            work_information: row.work_information,
            contact_information: row.contact_information,
            circles: row.circles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_domain_contact() {
        let now = chrono::Utc::now();
        let row = ContactRow {
            id: 7,
            firstname: "Ann".into(),
            lastname: "Lee".into(),
            nickname: String::new(),
            gender: String::new(),
            email: "ann@example.com".into(),
            phone: String::new(),
            birthday: NaiveDate::from_ymd_opt(1990, 4, 21),
            address: String::new(),
            how_we_met: String::new(),
            food_preference: String::new(),
            work_information: String::new(),
            contact_information: String::new(),
            circles: vec!["climbing".into()],
            created_at: now,
            updated_at: now,
        };
        let contact = Contact::from(row);
        assert_eq!(contact.id, 7);
        assert_eq!(contact.firstname, "Ann");
        assert_eq!(contact.lastname, "Lee");
        assert_eq!(contact.circles, vec!["climbing".to_string()]);
        assert_eq!(contact.birthday, NaiveDate::from_ymd_opt(1990, 4, 21));
    }
}
