//! Repository for the `contacts` table.

use sqlx::PgPool;
use rapport_core::contact::ContactDraft;
use rapport_core::types::DbId;

use crate::models::contact::ContactRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, firstname, lastname, nickname, gender, email, phone, birthday, \
     address, how_we_met, food_preference, work_information, contact_information, circles, \
     created_at, updated_at";

/// Lookups and writes used by contact import.
pub struct ContactRepo;

impl ContactRepo {
    /// Insert a contact. Columns the draft leaves unset take their table
    /// defaults.
    pub async fn create(pool: &PgPool, input: &ContactDraft) -> Result<ContactRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO contacts (firstname, lastname, nickname, gender, email, phone, birthday,
                                   address, how_we_met, food_preference, work_information,
                                   contact_information, circles)
             VALUES (COALESCE($1, ''), COALESCE($2, ''), COALESCE($3, ''), COALESCE($4, ''),
                     COALESCE($5, ''), COALESCE($6, ''), $7, COALESCE($8, ''),
                     COALESCE($9, ''), COALESCE($10, ''), COALESCE($11, ''),
                     COALESCE($12, ''), COALESCE($13, '{{}}'::text[]))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContactRow>(&query)
            .bind(&input.firstname)
            .bind(&input.lastname)
            .bind(&input.nickname)
            .bind(&input.gender)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.birthday)
            .bind(&input.address)
            .bind(&input.how_we_met)
            .bind(&input.food_preference)
            .bind(&input.work_information)
            .bind(&input.contact_information)
            .bind(&input.circles)
            .fetch_one(pool)
            .await
    }

    /// Merge a draft onto a contact. Only non-`None` fields are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &ContactDraft,
    ) -> Result<Option<ContactRow>, sqlx::Error> {
        let query = format!(
            "UPDATE contacts SET
                firstname = COALESCE($2, firstname),
                lastname = COALESCE($3, lastname),
                nickname = COALESCE($4, nickname),
                gender = COALESCE($5, gender),
                email = COALESCE($6, email),
                phone = COALESCE($7, phone),
                birthday = COALESCE($8, birthday),
                address = COALESCE($9, address),
                how_we_met = COALESCE($10, how_we_met),
                food_preference = COALESCE($11, food_preference),
                work_information = COALESCE($12, work_information),
                contact_information = COALESCE($13, contact_information),
                circles = COALESCE($14, circles),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContactRow>(&query)
            .bind(id)
            .bind(&input.firstname)
            .bind(&input.lastname)
            .bind(&input.nickname)
            .bind(&input.gender)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.birthday)
            .bind(&input.address)
            .bind(&input.how_we_met)
            .bind(&input.food_preference)
            .bind(&input.work_information)
            .bind(&input.contact_information)
            .bind(&input.circles)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive exact email match. Lowest id wins if several share it.
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<ContactRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contacts
             WHERE email <> '' AND LOWER(email) = LOWER(TRIM($1))
             ORDER BY id ASC
             LIMIT 1"
        );
        sqlx::query_as::<_, ContactRow>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Contacts whose trimmed first and last names match case-insensitively,
    /// ordered by id ascending.
    pub async fn find_by_name(
        pool: &PgPool,
        firstname: &str,
        lastname: &str,
    ) -> Result<Vec<ContactRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM contacts
             WHERE LOWER(TRIM(firstname)) = LOWER(TRIM($1))
               AND LOWER(TRIM(lastname)) = LOWER(TRIM($2))
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ContactRow>(&query)
            .bind(firstname)
            .bind(lastname)
            .fetch_all(pool)
            .await
    }
}
