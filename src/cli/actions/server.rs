use crate::auth::AuthService;
use crate::cli::actions::Action;
use crate::gateway::{self, AppState};
use crate::notify::LogNotifier;
use crate::pending::PendingActionLedger;
use crate::session::RefreshTokenLedger;
use crate::store::memory::MemoryStore;
use crate::token::TokenCodec;
use crate::totp::TotpManager;
use crate::APP_USER_AGENT;
use anyhow::Result;
use std::sync::Arc;

/// Wire the stores, ledgers and services together and run the gateway.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { config } => {
            let config = *config;

            let store = Arc::new(MemoryStore::new());
            let notifier = Arc::new(LogNotifier);

            let codec = TokenCodec::new(&config.signing_key, config.access_token_lifetime());
            let refresh_tokens =
                RefreshTokenLedger::new(store.clone(), config.refresh_token_lifetime());
            let pending_actions =
                PendingActionLedger::new(store.clone(), config.pending_action_lifetime());
            let totp = config.totp.as_ref().map(TotpManager::new);

            let auth = AuthService::new(
                store.clone(),
                refresh_tokens,
                pending_actions,
                codec.clone(),
                totp.clone(),
                notifier.clone(),
            );

            // Redirects are relayed to the caller, never resolved here.
            let client = reqwest::Client::builder()
                .user_agent(APP_USER_AGENT)
                .redirect(reqwest::redirect::Policy::none())
                .build()?;

            let state = Arc::new(AppState {
                config,
                auth,
                users: store,
                totp,
                codec,
                client,
                notifier,
            });

            gateway::serve(state).await?;
        }
    }

    Ok(())
}
