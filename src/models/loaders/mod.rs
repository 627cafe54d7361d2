pub mod blueprint_loader;

pub use blueprint_loader::{load_all_blueprints, load_toml_to_blueprint};
