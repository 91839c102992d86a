//! 콘솔 출력 (표 / JSON)

use extrt_core::{Extension, PluginInfo, ResolvedExtension};
use extrt_foundation::{Diagnostic, RuntimeConfig};
use serde_json::{json, Value};
use std::sync::Arc;

const SEPARATOR: &str = "─────────────────────────────────────────────────────────";

pub fn print_config(config: &RuntimeConfig, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Runtime configuration");
    println!("{}", SEPARATOR);
    println!("  host API version : {}", config.host_api_version);
    match config.load_timeout_ms {
        Some(ms) => println!("  load timeout     : {}ms", ms),
        None => println!("  load timeout     : none"),
    }
    println!("  history size     : {}", config.diagnostic_history);
    println!("  shared modules   : {}", config.shared_modules.join(", "));
    if config.initial_flags.is_empty() {
        println!("  flags            : (none)");
    } else {
        println!("  flags:");
        for (name, value) in &config.initial_flags {
            println!("    {:<30} {}", name, value);
        }
    }
    Ok(())
}

pub fn print_plugins(plugins: &[PluginInfo]) {
    println!("Plugins ({})", plugins.len());
    println!("{}", SEPARATOR);
    if plugins.is_empty() {
        println!("  (none)");
    }

    for plugin in plugins {
        let enabled = if plugin.enabled { "" } else { " [disabled]" };
        println!(
            "  {:<24} {:<10} {:<8} {:>3} ext{}",
            plugin.id, plugin.version, plugin.status, plugin.extension_count, enabled
        );
        if let Some(error) = &plugin.error {
            println!("    error: {}", error);
        }
    }
    println!();
}

pub fn print_extensions(extensions: &[Arc<Extension>]) {
    println!("Extensions ({})", extensions.len());
    println!("{}", SEPARATOR);
    if extensions.is_empty() {
        println!("  (none)");
    }

    for extension in extensions {
        let marker = if extension.has_code_refs() { " *" } else { "" };
        println!("  {:<28} {}{}", extension.uid, extension.kind, marker);
    }
    println!();
}

pub fn print_resolved(resolved: &[ResolvedExtension]) -> anyhow::Result<()> {
    println!("Resolved ({})", resolved.len());
    println!("{}", SEPARATOR);
    for extension in resolved {
        println!("  {}", extension.uid());
        let properties = serde_json::to_string_pretty(&extension.properties)?;
        for line in properties.lines() {
            println!("    {}", line);
        }
    }
    println!();
    Ok(())
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    println!("Diagnostics ({})", diagnostics.len());
    println!("{}", SEPARATOR);
    for diagnostic in diagnostics {
        println!(
            "  [{}] {}: {}",
            diagnostic.code,
            diagnostic.plugin_id.as_deref().unwrap_or("-"),
            diagnostic.message
        );
    }
}

pub fn print_json(
    plugins: &[PluginInfo],
    extensions: &[Arc<Extension>],
    resolved: Option<&[ResolvedExtension]>,
    diagnostics: &[Diagnostic],
) -> anyhow::Result<()> {
    let mut report = json!({
        "plugins": plugins,
        "extensions": extensions.iter().map(|e| e.as_ref()).collect::<Vec<_>>(),
        "diagnostics": diagnostics,
    });

    if let Some(resolved) = resolved {
        report["resolved"] = Value::Array(resolved.iter().map(resolved_json).collect());
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn resolved_json(resolved: &ResolvedExtension) -> Value {
    json!({
        "uid": resolved.extension.uid,
        "type": resolved.extension.kind.as_str(),
        "pluginId": resolved.extension.plugin_id,
        "properties": resolved.properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_json_shape() {
        let extension = Arc::new(Extension {
            uid: "acme[0]".to_string(),
            kind: "console.page/route".into(),
            plugin_id: "acme".to_string(),
            properties: json!({ "component": { "$codeRef": "pages.Main" } }),
            flags: None,
            insert_before: vec![],
            insert_after: vec![],
        });
        let resolved = ResolvedExtension {
            extension,
            properties: json!({ "component": "main-page" }),
        };

        let value = resolved_json(&resolved);
        assert_eq!(value["type"], "console.page/route");
        assert_eq!(value["pluginId"], "acme");
        assert_eq!(value["properties"]["component"], "main-page");
    }
}
