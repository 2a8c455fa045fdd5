use {
    parrot_common::types::ChatType,
    parrot_config::{
        DiscordConfig,
        gating::{self, DmPolicy, GroupPolicy, MentionMode},
    },
};

/// Determine if an inbound message should be processed.
///
/// Returns `Ok(())` if the message is allowed, or `Err(reason)` if it
/// should be silently dropped.
pub fn check_access(
    config: &DiscordConfig,
    chat_type: &ChatType,
    peer_id: &str,
    username: Option<&str>,
    guild_id: Option<&str>,
    bot_mentioned: bool,
) -> Result<(), AccessDenied> {
    match chat_type {
        ChatType::Dm => check_dm_access(config, peer_id, username),
        ChatType::Channel => check_guild_access(config, guild_id, bot_mentioned),
    }
}

fn check_dm_access(
    config: &DiscordConfig,
    peer_id: &str,
    username: Option<&str>,
) -> Result<(), AccessDenied> {
    match config.dm_policy {
        DmPolicy::Disabled => Err(AccessDenied::DmsDisabled),
        DmPolicy::Open => Ok(()),
        DmPolicy::Allowlist => {
            if config.allowlist.is_empty() {
                return Err(AccessDenied::NotOnAllowlist);
            }
            if gating::is_allowed(peer_id, &config.allowlist)
                || username.is_some_and(|u| gating::is_allowed(u, &config.allowlist))
            {
                Ok(())
            } else {
                Err(AccessDenied::NotOnAllowlist)
            }
        },
    }
}

fn check_guild_access(
    config: &DiscordConfig,
    guild_id: Option<&str>,
    bot_mentioned: bool,
) -> Result<(), AccessDenied> {
    match config.group_policy {
        GroupPolicy::Disabled => return Err(AccessDenied::GuildsDisabled),
        GroupPolicy::Allowlist => {
            let gid = guild_id.unwrap_or("");
            if config.guild_allowlist.is_empty()
                || !gating::is_allowed(gid, &config.guild_allowlist)
            {
                return Err(AccessDenied::GuildNotOnAllowlist);
            }
        },
        GroupPolicy::Open => {},
    }

    match config.mention_mode {
        MentionMode::Always => Ok(()),
        MentionMode::None => Err(AccessDenied::MentionModeNone),
        MentionMode::Mention => {
            if bot_mentioned {
                Ok(())
            } else {
                Err(AccessDenied::NotMentioned)
            }
        },
    }
}

/// Whether a user may use admin-scoped features (cross-guild search,
/// plugin create/remove).
#[must_use]
pub fn is_admin(config: &DiscordConfig, peer_id: &str, username: Option<&str>) -> bool {
    gating::is_allowed(peer_id, &config.admin_users)
        || username.is_some_and(|u| gating::is_allowed(u, &config.admin_users))
}

/// Reason an inbound message was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDenied {
    DmsDisabled,
    NotOnAllowlist,
    GuildsDisabled,
    GuildNotOnAllowlist,
    MentionModeNone,
    NotMentioned,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DmsDisabled => write!(f, "DMs are disabled"),
            Self::NotOnAllowlist => write!(f, "user not on allowlist"),
            Self::GuildsDisabled => write!(f, "guilds are disabled"),
            Self::GuildNotOnAllowlist => write!(f, "guild not on allowlist"),
            Self::MentionModeNone => write!(f, "bot does not respond in guilds"),
            Self::NotMentioned => write!(f, "bot was not mentioned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DiscordConfig {
        DiscordConfig::default()
    }

    #[test]
    fn open_dm_allows_all() {
        let mut c = cfg();
        c.dm_policy = DmPolicy::Open;
        assert!(check_access(&c, &ChatType::Dm, "anyone", None, None, false).is_ok());
    }

    #[test]
    fn disabled_dm_rejects() {
        let mut c = cfg();
        c.dm_policy = DmPolicy::Disabled;
        assert_eq!(
            check_access(&c, &ChatType::Dm, "user", None, None, false),
            Err(AccessDenied::DmsDisabled)
        );
    }

    #[test]
    fn allowlist_dm_by_peer_id_or_username() {
        let mut c = cfg();
        c.allowlist = vec!["400347514466992128".into()];
        assert!(check_access(&c, &ChatType::Dm, "400347514466992128", None, None, false).is_ok());
        assert_eq!(
            check_access(&c, &ChatType::Dm, "999999999", None, None, false),
            Err(AccessDenied::NotOnAllowlist)
        );

        let mut by_name = cfg();
        by_name.allowlist = vec!["somebody".into()];
        assert!(
            check_access(
                &by_name,
                &ChatType::Dm,
                "999999999",
                Some("somebody"),
                None,
                false
            )
            .is_ok()
        );
    }

    #[test]
    fn empty_dm_allowlist_denies_all() {
        let c = cfg();
        assert_eq!(
            check_access(&c, &ChatType::Dm, "anyone", Some("user"), None, false),
            Err(AccessDenied::NotOnAllowlist)
        );
    }

    #[test]
    fn guild_open_always_allows() {
        let c = cfg(); // group_policy=Open, mention_mode=Always
        assert!(check_access(&c, &ChatType::Channel, "user", None, Some("g1"), false).is_ok());
    }

    #[test]
    fn guild_mention_mode_requires_mention() {
        let mut c = cfg();
        c.mention_mode = MentionMode::Mention;
        assert_eq!(
            check_access(&c, &ChatType::Channel, "user", None, Some("g1"), false),
            Err(AccessDenied::NotMentioned)
        );
        assert!(check_access(&c, &ChatType::Channel, "user", None, Some("g1"), true).is_ok());
    }

    #[test]
    fn guild_allowlist_gates_by_guild_id() {
        let mut c = cfg();
        c.group_policy = GroupPolicy::Allowlist;
        c.guild_allowlist = vec!["g1".into()];
        assert!(check_access(&c, &ChatType::Channel, "user", None, Some("g1"), false).is_ok());
        assert_eq!(
            check_access(&c, &ChatType::Channel, "user", None, Some("g2"), false),
            Err(AccessDenied::GuildNotOnAllowlist)
        );
    }

    #[test]
    fn empty_guild_allowlist_denies_all() {
        let mut c = cfg();
        c.group_policy = GroupPolicy::Allowlist;
        assert_eq!(
            check_access(&c, &ChatType::Channel, "user", None, Some("g1"), true),
            Err(AccessDenied::GuildNotOnAllowlist)
        );
    }

    #[test]
    fn admin_matches_id_or_username() {
        let mut c = cfg();
        c.admin_users = vec!["42".into(), "owner".into()];
        assert!(is_admin(&c, "42", None));
        assert!(is_admin(&c, "7", Some("owner")));
        assert!(!is_admin(&c, "7", Some("guest")));
    }
}
