/// Errors surfaced by scene generation. Neither variant is fatal: the
/// session logs the failure and retries on the next regeneration cycle.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("asset load failed: {0}")]
    AssetLoad(anyhow::Error),

    /// An asset result arrived after the generation that requested it was
    /// already swept. The result must be discarded, never attached.
    #[error("generation {0} was superseded during an asset load")]
    StaleGeneration(u64),
}
