pub mod assets;
pub mod networking;
pub mod scene;
pub mod settings;
pub mod util;
pub mod viewer;
