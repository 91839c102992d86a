//! `extrt inspect` - 플러그인 등록 후 상태와 익스텐션 출력

use crate::report;
use anyhow::{bail, Context};
use extrt_core::{predicates, Extension, HttpModuleLoader, PluginManifest, PluginStatus, Runtime};
use extrt_foundation::RuntimeConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct InspectOptions {
    pub sources: Vec<String>,
    pub kind: Option<String>,
    pub resolve: bool,
    pub json: bool,
}

pub async fn run(config: RuntimeConfig, options: InspectOptions) -> anyhow::Result<()> {
    let modules = Arc::new(HttpModuleLoader::new(&config)?);
    let runtime = Runtime::new(config, modules)?;

    // 소스는 독립적이므로 동시에 등록
    let registrations = options
        .sources
        .iter()
        .map(|source| register_source(&runtime, source));
    let statuses = futures::future::join_all(registrations).await;

    for (source, status) in options.sources.iter().zip(&statuses) {
        match status {
            Ok(status) => info!("{} -> {}", source, status),
            Err(e) => debug!("{} could not be registered: {}", source, e),
        }
    }

    let filter: Box<dyn Fn(&Extension) -> bool + Send + Sync> = match &options.kind {
        Some(kind) => Box::new(predicates::of_kind(kind.as_str())),
        None => Box::new(predicates::any),
    };

    let extensions = runtime.get_extensions(&filter);
    let resolved = if options.resolve {
        Some(runtime.get_resolved_extensions(&filter).await)
    } else {
        None
    };

    let plugins = runtime.plugin_info();
    let diagnostics = runtime.diagnostics().history(None);

    if options.json {
        report::print_json(&plugins, &extensions, resolved.as_deref(), &diagnostics)?;
    } else {
        report::print_plugins(&plugins);
        report::print_extensions(&extensions);
        if let Some(resolved) = &resolved {
            report::print_resolved(resolved)?;
        }
        report::print_diagnostics(&diagnostics);
    }

    let failed = statuses
        .iter()
        .filter(|s| !matches!(s, Ok(PluginStatus::Loaded)))
        .count();
    if failed > 0 {
        bail!("{} of {} plugin source(s) did not load", failed, statuses.len());
    }
    Ok(())
}

/// URL 이면 원격 매니페스트, 아니면 로컬 매니페스트 파일
async fn register_source(runtime: &Runtime, source: &str) -> anyhow::Result<PluginStatus> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(runtime.register_from_url(source).await?);
    }

    let manifest = read_manifest(Path::new(source))?;
    Ok(runtime.register(manifest).await)
}

fn read_manifest(path: &Path) -> anyhow::Result<PluginManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let manifest = PluginManifest::from_json(&content)
        .with_context(|| format!("Invalid manifest {}", path.display()))?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_manifest_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"id":"acme","name":"Acme","version":"1.0.0","remoteEntryURL":"plugin-entry.json"}}"#
        )
        .unwrap();

        let manifest = read_manifest(file.path()).unwrap();
        assert_eq!(manifest.id, "acme");
    }

    #[test]
    fn test_read_missing_manifest() {
        assert!(read_manifest(Path::new("/nonexistent/plugin-manifest.json")).is_err());
    }
}
