use crate::assets::AssetError;
use crate::assets::cache::{AssetRequest, LoadedAsset};

/// Everything the dispatcher thread reacts to. Producers are the network thread (frames) and the
/// fetch workers (asset results), so all scene and slot mutation happens in arrival order on a
/// single thread.
#[derive(Debug)]
pub enum ViewerEvent {
    Frame(String),
    AssetLoaded(LoadedAsset),
    AssetFailed { request: AssetRequest, error: AssetError },
}
