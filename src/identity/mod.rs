//! Identity: bearer-token authentication against an external identity provider.
//! The rest of the crate sees `AuthProvider`, `Principal` and the `require_auth` middleware.

mod principal;
mod provider;
mod request_context;
mod guard;
pub mod supabase;

pub use principal::Principal;
pub use provider::{AuthOutcome, AuthProvider, Credentials, SessionTokens};
pub use request_context::AuthContext;
pub use guard::{bearer_token, require_auth};
pub use supabase::SupabaseAuth;
