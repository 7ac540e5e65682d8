use crate::application::repos::PersistError;

pub fn map_sqlx_error(err: sqlx::Error) -> PersistError {
    match err {
        sqlx::Error::PoolTimedOut => PersistError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request")
                || db.message().contains("statement timeout") =>
        {
            PersistError::Timeout
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => {
            PersistError::integrity(db.message())
        }
        sqlx::Error::ColumnDecode { index, source } => {
            PersistError::integrity(format!("column {index} could not be decoded: {source}"))
        }
        other => PersistError::from_persistence(other),
    }
}
