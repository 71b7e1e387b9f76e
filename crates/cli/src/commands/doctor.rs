//! `pitwall doctor` — Diagnose the configured backend.

use std::path::Path;

use pitwall_config::ResolvedBackend;

use super::{config_path, load_config};

pub async fn run(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Pitwall Doctor — Backend Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let file = config_path(path);
    if file.exists() {
        println!("  ✅ Config file found at {}", file.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults", file.display());
    }

    let config = match load_config(path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            return Err(e);
        }
    };

    match config.resolve_backend() {
        Ok(ResolvedBackend::Local(local)) => {
            println!("  ✅ Backend: local model");
            if local.model_path.exists() {
                println!("  ✅ Model file: {}", local.model_path.display());
            } else {
                println!("  ❌ Model file missing: {}", local.model_path.display());
                issues += 1;
            }
            println!(
                "     threads={} context={} batch={}",
                local.threads, local.context_size, local.batch_size
            );
        }
        Ok(ResolvedBackend::Remote(endpoint)) => {
            println!(
                "  ✅ Backend: {} ({:?}) at {}",
                endpoint.name, endpoint.kind, endpoint.base_url
            );
            println!("     model={}", endpoint.model);
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    if issues == 0 {
        match pitwall_providers::build_from_config(&config) {
            Ok(router) => match router.health_check().await {
                Ok(true) => println!("  ✅ {} is answering", router.provider_name()),
                Ok(false) => {
                    println!("  ⚠️  {} responded but reports unhealthy", router.provider_name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Health check failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ {e}");
                issues += 1;
            }
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
