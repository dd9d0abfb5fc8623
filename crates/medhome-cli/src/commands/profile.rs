use std::path::Path;

use crate::EndpointArgs;

pub fn run(config: Option<&Path>) {
    let profile = super::load_profile(config, &EndpointArgs::default());
    match profile.to_toml() {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("Error rendering profile: {e}");
            std::process::exit(1);
        }
    }
}
