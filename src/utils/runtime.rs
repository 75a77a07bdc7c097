use anyhow::Result;

/// All handlers interleave cooperatively on one thread; the engine relies on
/// this for its single-writer guarantees.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
