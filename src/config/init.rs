// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates mtadeploy.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::template());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"space: {}
descriptor: {}
# Local path or http:// URL of the MTA archive
archive: {}
cluster_state: {}
# ALL, SAME_HIGHER, or HIGHER
version_rule: {}
keep_original_names: {}
poll_interval: {}
upload:
  timeout: {}
"#,
        config.space,
        config.descriptor.display(),
        config.archive,
        config.cluster_state.display(),
        config.version_rule,
        config.keep_original_names,
        humantime_serde::re::humantime::format_duration(config.poll_interval),
        humantime_serde::re::humantime::format_duration(config.upload.timeout),
    )
}
