//! Build script for icoach-live
//!
//! Stamps the binary with its source revision and checks the question
//! dataset that is embedded with `include_str!`. A malformed dataset fails
//! the build instead of the first interview.
//!
//! Exported to the crate:
//! - `GIT_HASH`: short revision, `-dirty` when the work tree has changes
//! - `BUILD_TIMESTAMP`: UTC, RFC 3339
//! - `BUILD_PROFILE`: debug or release
//! - `QUESTION_BRANCHES`: comma-separated branch ids of the embedded dataset

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

const DATASET: &str = "data/questions.json";

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn revision() -> String {
    let Some(hash) = git(&["rev-parse", "--short=8", "HEAD"]) else {
        return "unknown".to_string();
    };
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some_and(|s| !s.is_empty());
    if dirty {
        format!("{}-dirty", hash)
    } else {
        hash
    }
}

/// Branch ids of the dataset, after checking every question has the fields
/// the provider needs and that ids are unique
fn dataset_branches(raw: &str) -> Result<Vec<String>, String> {
    let root: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let branches = root
        .get("branches")
        .and_then(|b| b.as_object())
        .ok_or("missing \"branches\" object")?;
    if branches.is_empty() {
        return Err("no branches".to_string());
    }

    let common = serde_json::Value::Array(root.get("common").and_then(|c| c.as_array()).cloned().unwrap_or_default());
    let mut seen = HashSet::new();
    let lists = branches
        .iter()
        .map(|(name, list)| (name.as_str(), list))
        .chain(std::iter::once(("common", &common)));
    for (name, list) in lists {
        let list = list.as_array().ok_or(format!("branch {} is not a list", name))?;
        if list.is_empty() && name != "common" {
            return Err(format!("branch {} has no questions", name));
        }
        for question in list {
            for field in ["id", "text", "ideal_answer"] {
                let present = question.get(field).and_then(|v| v.as_str()).is_some_and(|s| !s.trim().is_empty());
                if !present {
                    return Err(format!("question in {} lacks \"{}\"", name, field));
                }
            }
            let id = question["id"].as_str().unwrap_or_default().to_string();
            if !seen.insert(id.clone()) {
                return Err(format!("duplicate question id {}", id));
            }
        }
    }

    Ok(branches.keys().cloned().collect())
}

fn main() {
    println!("cargo:rerun-if-changed={}", DATASET);
    for tracked in ["../.git/HEAD", "../.git/index"] {
        if Path::new(tracked).exists() {
            println!("cargo:rerun-if-changed={}", tracked);
        }
    }

    let raw = std::fs::read_to_string(DATASET).unwrap_or_else(|e| panic!("cannot read {}: {}", DATASET, e));
    let branches = dataset_branches(&raw).unwrap_or_else(|e| panic!("invalid {}: {}", DATASET, e));

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", revision());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
    println!("cargo:rustc-env=QUESTION_BRANCHES={}", branches.join(","));
}
