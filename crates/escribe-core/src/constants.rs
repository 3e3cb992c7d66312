/// Escribe — centralized constants.
/// Limits, endpoints and user-facing strings shared by the core and the binaries.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 500;
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
    /// Route served by the assistant proxy.
    pub const ASSISTANT_ROUTE: &str = "/api/ai";
    pub const DEFAULT_HOST: &str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 3001;
    pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3001";
}

// ─── Environment ──────────────────────────────────────────────────────────────

pub mod env {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const PORT: &str = "PORT";
    pub const PROXY_URL: &str = "ESCRIBE_PROXY_URL";
    pub const STORE_URL: &str = "SUPABASE_URL";
    pub const STORE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
}

// ─── Conversation ─────────────────────────────────────────────────────────────

pub mod conversation {
    /// Maximum number of turns kept by a conversation manager.
    pub const MAX_HISTORY: usize = 6;
    /// Prefix for assistant-visible error turns.
    pub const ERROR_PREFIX: &str = "⚠️ ";
    pub const BACKEND_UNREACHABLE: &str = "Error reaching AI backend";
    pub const REQUEST_IN_FLIGHT: &str = "A request is already in progress";
}

// ─── Proxy Errors ─────────────────────────────────────────────────────────────

pub mod proxy {
    pub const INVALID_MESSAGES: &str = "Missing or invalid messages array.";
    pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
    pub const NOT_FOUND: &str = "Not found";
    pub const UPSTREAM_FALLBACK: &str = "OpenAI API error";
}
