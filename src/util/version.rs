pub const APP_NAME: &str = "Craft Checker";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_TAG: Option<&str> = option_env!("GIT_TAG");

const USER_AGENT_NAME: &str = "craft-checker";

pub fn version_label() -> String {
    if let Some(tag) = GIT_TAG {
        tag.to_string()
    } else {
        format!("v{}", APP_VERSION)
    }
}

/// User-Agent sent with every catalog request.
pub fn user_agent() -> String {
    format!("{}/{}", USER_AGENT_NAME, version_label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_tool() {
        assert!(user_agent().starts_with("craft-checker/"));
        assert!(version_label().len() > 1);
    }
}
