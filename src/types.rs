pub type AppResult<T> = Result<T, anyhow::Error>;
