use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader, yaml::Hash};

use crate::config::ConfigError;

const INCLUDE_DIRECTIVE: &str = "!include";

/// Loads a YAML file, resolving `!include <relative path>` lines first.
///
/// Included documents are merged in the order they appear and the including
/// file's own keys are merged last, so they override anything included.
pub fn load_yaml_with_includes(path: &Path) -> Result<Yaml, ConfigError> {
    let mut visiting = Vec::new();
    let res = process_includes_recursive(&path.to_path_buf(), &mut visiting)?;
    debug!(path = %path.display(), "Processed yaml includes");
    Ok(res)
}

/// Same as [`load_yaml_with_includes`], re-emitted as a single YAML string.
pub fn render_yaml_with_includes(path: &Path) -> Result<String, ConfigError> {
    let yaml = load_yaml_with_includes(path)?;
    let mut out_str = String::new();
    {
        let mut emitter = YamlEmitter::new(&mut out_str);
        emitter
            .dump(&yaml)
            .map_err(|e| ConfigError::Emit(e.to_string()))?;
    }
    Ok(out_str)
}

fn process_includes_recursive(
    path: &PathBuf,
    visiting: &mut Vec<PathBuf>,
) -> Result<Yaml, ConfigError> {
    if visiting.contains(path) {
        return Err(ConfigError::IncludeCycle(path.clone()));
    }
    visiting.push(path.clone());

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let base_path = path.parent().unwrap_or(Path::new(""));

    let (includes, rest): (Vec<&str>, Vec<&str>) = contents
        .lines()
        .partition(|&line| line.trim().starts_with(INCLUDE_DIRECTIVE));

    let mut merged_includes: Option<Yaml> = None;
    for line in includes {
        let include_path = line.trim().trim_start_matches(INCLUDE_DIRECTIVE).trim();
        let full_path = base_path.join(include_path);
        debug!(include = %full_path.display(), "Resolving include");
        let included = process_includes_recursive(&full_path, visiting)?;
        merged_includes = Some(match merged_includes {
            Some(acc) => merge_yaml(&acc, &included),
            None => included,
        });
    }

    let rest_yamls =
        YamlLoader::load_from_str(&rest.join("\n")).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            message: source.to_string(),
        })?;

    let merged_rest = rest_yamls
        .into_iter()
        .reduce(|acc, next| merge_yaml(&acc, &next))
        .unwrap_or_else(|| Yaml::Hash(Hash::new()));

    visiting.pop();

    match merged_includes {
        Some(merged_includes) => Ok(merge_yaml(&merged_includes, &merged_rest)),
        None => Ok(merged_rest),
    }
}

fn merge_yaml(base: &Yaml, override_yaml: &Yaml) -> Yaml {
    match (base, override_yaml) {
        (Yaml::Hash(base_hash), Yaml::Hash(override_hash)) => {
            let mut result = base_hash.clone();
            for (key, value) in override_hash {
                match base_hash.get(key) {
                    Some(base_value) => {
                        result.insert(key.clone(), merge_yaml(base_value, value));
                    }
                    None => {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }
            Yaml::Hash(result)
        }
        (_, override_value) => override_value.clone(),
    }
}
