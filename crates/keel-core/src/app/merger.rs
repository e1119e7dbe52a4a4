//! Spec merger - AdjustOptions を ServiceSpec に適用する純粋関数
//!
//! 入力の spec は変更せず、新しい spec を返します。
//!
//! # 適用順序
//! 1. image
//! 2. env / envRemove（上書き → 削除、キー順で直列化）
//! 3. labels / labelRemove
//! 4. replicas
//! 5. force（ForceUpdate を +1、image の digest を除去）

use std::collections::BTreeMap;

use crate::domain::{AdjustOptions, ServiceSpec};

pub fn merge(spec: &ServiceSpec, options: &AdjustOptions) -> ServiceSpec {
    let mut merged = spec.clone();

    if let Some(image) = &options.image {
        merged.task_template.container_spec.image = image.clone();
    }

    if options.env.is_some() || options.env_remove.is_some() {
        let mut env = parse_env(&merged.task_template.container_spec.env);
        for (key, value) in options.env.iter().flatten() {
            env.insert(key.clone(), Some(value.clone()));
        }
        for key in options.env_remove.iter().flatten() {
            env.remove(key);
        }
        merged.task_template.container_spec.env = render_env(env);
    }

    if options.labels.is_some() || options.label_remove.is_some() {
        for (key, value) in options.labels.iter().flatten() {
            merged.labels.insert(key.clone(), value.clone());
        }
        for key in options.label_remove.iter().flatten() {
            merged.labels.remove(key);
        }
    }

    if let Some(replicas) = options.replicas {
        merged.set_replicas(replicas);
    }

    if options.force {
        // 上限に達したら 0 に戻る
        merged.task_template.force_update = merged.task_template.force_update.wrapping_add(1);
        let image = strip_digest(&merged.task_template.container_spec.image).to_string();
        merged.task_template.container_spec.image = image;
    }

    merged
}

/// `app:1@sha256:...` -> `app:1`
pub fn strip_digest(image: &str) -> &str {
    match image.split_once('@') {
        Some((reference, _digest)) => reference,
        None => image,
    }
}

// "KEY" (without '=') is kept as a bare key
fn parse_env(entries: &[String]) -> BTreeMap<String, Option<String>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (entry.clone(), None),
        })
        .collect()
}

fn render_env(env: BTreeMap<String, Option<String>>) -> Vec<String> {
    env.into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={value}"),
            None => key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ServiceSpec {
        ServiceSpec::new("web", "app:1@sha256:abc123")
            .with_env("A=0")
            .with_env("B=2")
            .with_label("tier", "web")
            .with_replicas(2)
    }

    #[test]
    fn empty_options_leave_spec_unchanged() {
        let spec = base();
        assert_eq!(merge(&spec, &AdjustOptions::default()), spec);
    }

    #[test]
    fn env_overlay_then_remove() {
        let spec = ServiceSpec::new("web", "app:1").with_env("A=0").with_env("B=2");
        let opts = AdjustOptions::new().with_env("A", "1").remove_env("B");

        let merged = merge(&spec, &opts);
        assert_eq!(merged.env(), ["A=1".to_string()]);
        // 入力は変更されない
        assert_eq!(spec.env(), ["A=0".to_string(), "B=2".to_string()]);
    }

    #[test]
    fn env_is_sorted_by_key_and_keeps_bare_keys() {
        let spec = ServiceSpec::new("web", "app:1")
            .with_env("ZED=1")
            .with_env("DEBUG")
            .with_env("URL=http://x?a=b");
        let merged = merge(&spec, &AdjustOptions::new().with_env("ALPHA", "0"));
        assert_eq!(
            merged.env(),
            [
                "ALPHA=0".to_string(),
                "DEBUG".to_string(),
                "URL=http://x?a=b".to_string(),
                "ZED=1".to_string(),
            ]
        );
    }

    #[test]
    fn labels_overlay_then_remove() {
        let opts = AdjustOptions::new()
            .with_label("team", "core")
            .with_label("tier", "api")
            .remove_label("missing");
        let merged = merge(&base(), &opts);
        assert_eq!(merged.labels.get("tier").map(String::as_str), Some("api"));
        assert_eq!(merged.labels.get("team").map(String::as_str), Some("core"));

        let merged = merge(&merged, &AdjustOptions::new().remove_label("team"));
        assert!(!merged.labels.contains_key("team"));
    }

    #[test]
    fn replicas_create_mode_when_missing() {
        let spec = ServiceSpec::new("web", "app:1");
        assert_eq!(spec.replicas(), None);

        let merged = merge(&spec, &AdjustOptions::replicas(4));
        assert_eq!(merged.replicas(), Some(4));
    }

    #[test]
    fn image_is_replaced() {
        let merged = merge(&base(), &AdjustOptions::new().with_image("app:2"));
        assert_eq!(merged.image(), "app:2");
        assert_eq!(merged.env(), base().env());
    }

    #[test]
    fn force_twice_bumps_counter_and_strips_digest_once() {
        let force = AdjustOptions::new().with_force();

        let once = merge(&base(), &force);
        assert_eq!(once.task_template.force_update, 1);
        assert_eq!(once.image(), "app:1");

        let twice = merge(&once, &force);
        assert_eq!(twice.task_template.force_update, 2);
        assert_eq!(twice.image(), "app:1");
    }

    #[test]
    fn force_counter_wraps_at_max() {
        let mut spec = base();
        spec.task_template.force_update = u64::MAX;

        let merged = merge(&spec, &AdjustOptions::new().with_force());
        assert_eq!(merged.task_template.force_update, 0);
    }

    #[test]
    fn force_applies_after_image_replacement() {
        let opts = AdjustOptions::new()
            .with_image("app:3@sha256:fff")
            .with_force();
        let merged = merge(&base(), &opts);
        assert_eq!(merged.image(), "app:3");
    }

    #[test]
    fn strip_digest_without_digest_is_identity() {
        assert_eq!(strip_digest("registry:5000/app:1"), "registry:5000/app:1");
        assert_eq!(strip_digest("app@sha256:1"), "app");
    }
}
