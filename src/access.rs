//! Owner scoping for by-id reads and writes.

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Holding, LedgerEntry, OwnerId};

pub trait Owned {
    fn owner_id(&self) -> OwnerId;
}

impl Owned for Holding {
    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

impl Owned for LedgerEntry {
    fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

/// Parse a path id. A malformed id cannot name a stored record, so it is
/// reported as not found.
pub fn parse_record_id(raw: &str, what: &'static str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(what))
}

/// Absent records are `NotFound`; records owned by someone else are
/// `NotAuthorized`.
pub fn authorize<T: Owned>(record: Option<T>, caller: OwnerId, what: &'static str) -> AppResult<T> {
    let record = record.ok_or(AppError::NotFound(what))?;
    if record.owner_id() != caller {
        tracing::warn!("owner {} denied access to {} owned by {}", caller, what, record.owner_id());
        return Err(AppError::NotAuthorized);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn holding(owner: OwnerId) -> Holding {
        Holding {
            id: Uuid::new_v4(),
            owner_id: owner,
            symbol: "AAPL".into(),
            shares: dec!(1),
            cost_basis: dec!(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn distinguishes_missing_from_foreign() {
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();

        assert!(authorize(Some(holding(owner)), owner, "Portfolio item").is_ok());
        assert!(matches!(
            authorize(Some(holding(owner)), intruder, "Portfolio item"),
            Err(AppError::NotAuthorized)
        ));
        assert!(matches!(
            authorize::<Holding>(None, owner, "Portfolio item"),
            Err(AppError::NotFound("Portfolio item"))
        ));
    }

    #[test]
    fn malformed_ids_are_not_found() {
        assert!(matches!(
            parse_record_id("not-a-uuid", "Transaction"),
            Err(AppError::NotFound("Transaction"))
        ));
    }
}
