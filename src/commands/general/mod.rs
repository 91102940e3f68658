/// Help text for every command.
pub(crate) mod help;
/// Per-server language.
pub(crate) mod language;
/// Gateway, node and internet latency.
pub(crate) mod ping;
