use probe_types::StorageProvider;

/// Governs which synced SPs the harness actually probes, per §4.6:
/// "returns SPs to probe; governed by a config switch between 'all active'
/// and 'approved only'."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    AllActive,
    ApprovedOnly,
}

/// §4.6 `getTestingProviders()`.
pub fn get_testing_providers(
    providers: &[StorageProvider],
    mode: SelectionMode,
) -> Vec<StorageProvider> {
    providers
        .iter()
        .filter(|p| match mode {
            SelectionMode::AllActive => p.active,
            SelectionMode::ApprovedOnly => p.active && p.approved,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sp(active: bool, approved: bool) -> StorageProvider {
        let now = Utc::now();
        StorageProvider {
            address: "0xabc".to_string(),
            provider_id: 1,
            service_url: "https://sp.example".to_string(),
            active,
            approved,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn all_active_includes_unapproved() {
        let providers = vec![sp(true, false), sp(true, true), sp(false, true)];
        let selected = get_testing_providers(&providers, SelectionMode::AllActive);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn approved_only_excludes_unapproved_actives() {
        let providers = vec![sp(true, false), sp(true, true), sp(false, true)];
        let selected = get_testing_providers(&providers, SelectionMode::ApprovedOnly);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].approved);
    }
}
