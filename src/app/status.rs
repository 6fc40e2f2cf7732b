use crate::config::Config;
use crate::ui::style;

pub fn render_status(config: &Config) -> String {
    let token = if config
        .api
        .auth_token
        .as_deref()
        .is_some_and(|t| !t.is_empty())
    {
        "configured"
    } else {
        "not set"
    };

    [
        format!("◆ {}", style::header("InternHub status")),
        String::new(),
        format!("  Version     {}", env!("CARGO_PKG_VERSION")),
        format!("  Config      {}", style::value(config.config_path.display())),
        format!("  Data dir    {}", style::value(config.data_dir.display())),
        format!("  Sessions    {}", style::value(config.store_path().display())),
        String::new(),
        format!("  API         {}", style::url(&config.api.base_url)),
        format!("  Token       {token}"),
        format!(
            "  Timeouts    {}s request, {}s connect",
            config.api.timeout_secs, config.api.connect_timeout_secs
        ),
        String::new(),
        format!("  User type   {}", style::value(config.default_user_type)),
        format!("  Log level   {}", config.log_level),
        format!(
            "  Pacing      follow-up {}ms, searching {}ms",
            config.chat.follow_up_delay_ms, config.chat.searching_indicator_ms
        ),
    ]
    .join("\n")
}
