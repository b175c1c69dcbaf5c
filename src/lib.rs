pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod library;
pub mod settings;
pub mod processing {
    pub mod color;
    pub mod continuous;
    pub mod decode;
    pub mod formation;
    pub mod grid;
}
pub mod mosaic {
    pub mod actions;
    pub mod animation;
    pub mod effects;
    pub mod photo;
    pub mod placement;
    pub mod sequencer;
    pub mod system;
}
pub mod tasks {
    pub mod control;
    pub mod driver;
    pub mod files;
    pub mod loader;
}
