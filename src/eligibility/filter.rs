//! Eligibility Filter Module
//!
//! Decides from a user's settings whether they can be paid, and on which
//! chains.

use crate::types::UserSettings;
use std::collections::BTreeMap;

/// Supported payout chains and the settings key each wallet is saved under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletKey {
    /// Primary settlement chain
    Move,
    /// Secondary chain
    Ton,
}

impl WalletKey {
    pub const ALL: [WalletKey; 2] = [WalletKey::Move, WalletKey::Ton];

    /// Key in the user settings mapping
    pub fn setting_key(&self) -> &'static str {
        match self {
            WalletKey::Move => "web3_wallet_move",
            WalletKey::Ton => "web3_wallet_ton",
        }
    }

    /// Chain name used in obligations and manifests
    pub fn chain(&self) -> &'static str {
        match self {
            WalletKey::Move => "move",
            WalletKey::Ton => "ton",
        }
    }
}

/// Pure predicate over user settings
///
/// Addresses are not validated here; a present key is enough.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    keys: Vec<WalletKey>,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new(WalletKey::ALL.to_vec())
    }
}

impl EligibilityFilter {
    pub fn new(keys: Vec<WalletKey>) -> Self {
        Self { keys }
    }

    /// True iff the settings hold at least one recognized wallet key
    pub fn is_eligible(&self, settings: &UserSettings) -> bool {
        self.keys
            .iter()
            .any(|key| settings.values.contains_key(key.setting_key()))
    }

    /// Chain name to address for every recognized wallet in the settings
    pub fn wallets(&self, settings: &UserSettings) -> BTreeMap<String, String> {
        self.keys
            .iter()
            .filter_map(|key| {
                settings
                    .get(key.setting_key())
                    .map(|address| (key.chain().to_string(), address.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> UserSettings {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        UserSettings::new(1, values)
    }

    #[test]
    fn test_either_wallet_makes_user_eligible() {
        let filter = EligibilityFilter::default();

        assert!(filter.is_eligible(&settings(&[("web3_wallet_move", "0x1")])));
        assert!(filter.is_eligible(&settings(&[("web3_wallet_ton", "EQ1")])));
        assert!(filter.is_eligible(&settings(&[
            ("web3_wallet_move", "0x1"),
            ("web3_wallet_ton", "EQ1"),
        ])));
    }

    #[test]
    fn test_user_without_wallet_is_rejected() {
        let filter = EligibilityFilter::default();

        assert!(!filter.is_eligible(&settings(&[("theme", "dark")])));
        assert!(!filter.is_eligible(&settings(&[])));
    }

    #[test]
    fn test_wallets_map_keys_to_chain_names() {
        let filter = EligibilityFilter::default();
        let wallets = filter.wallets(&settings(&[
            ("web3_wallet_ton", "EQ1"),
            ("web3_wallet_move", "0x1"),
            ("theme", "dark"),
        ]));

        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets.get("move").map(String::as_str), Some("0x1"));
        assert_eq!(wallets.get("ton").map(String::as_str), Some("EQ1"));
    }

    #[test]
    fn test_filter_restricted_to_one_chain() {
        let filter = EligibilityFilter::new(vec![WalletKey::Move]);

        assert!(!filter.is_eligible(&settings(&[("web3_wallet_ton", "EQ1")])));
    }
}
