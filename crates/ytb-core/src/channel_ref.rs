//! Turning what the operator typed into a channel reference.

use std::fmt;

use url::Url;

use crate::{domain::SourceId, errors::Error, Result};

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

/// A YouTube channel as the operator referred to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelRef {
    /// `UC…` channel id (the only form the public feed accepts).
    ChannelId(String),
    /// `@handle`, stored without the `@`.
    Handle(String),
    /// Legacy `/c/<name>` custom URL.
    Custom(String),
    /// Legacy `/user/<name>` URL.
    User(String),
}

impl ChannelRef {
    /// Key used in the state file when the reference could not be resolved
    /// to a channel id.
    pub fn source_id(&self) -> SourceId {
        match self {
            ChannelRef::ChannelId(id) => SourceId::new(id.clone()),
            ChannelRef::Handle(h) => SourceId::new(format!("@{h}")),
            ChannelRef::Custom(c) => SourceId::new(format!("c/{c}")),
            ChannelRef::User(u) => SourceId::new(format!("user/{u}")),
        }
    }

    /// Inverse of [`ChannelRef::source_id`].
    pub fn from_source_id(id: &SourceId) -> Result<Self> {
        let raw = id.as_str();
        if let Some(h) = raw.strip_prefix('@') {
            return valid_name(h).map(ChannelRef::Handle);
        }
        if let Some(c) = raw.strip_prefix("c/") {
            return valid_name(c).map(ChannelRef::Custom);
        }
        if let Some(u) = raw.strip_prefix("user/") {
            return valid_name(u).map(ChannelRef::User);
        }
        if is_channel_id(raw) {
            return Ok(ChannelRef::ChannelId(raw.to_string()));
        }
        Err(Error::InvalidInput(format!("not a channel reference: {raw}")))
    }

    /// Channel page on `base` (e.g. `https://www.youtube.com`).
    pub fn channel_url(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            ChannelRef::ChannelId(id) => format!("{base}/channel/{id}"),
            ChannelRef::Handle(h) => format!("{base}/@{h}"),
            ChannelRef::Custom(c) => format!("{base}/c/{c}"),
            ChannelRef::User(u) => format!("{base}/user/{u}"),
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_id().as_str())
    }
}

/// Parse operator input into a [`ChannelRef`].
///
/// Accepts channel URLs with or without scheme (`youtube.com/@name`,
/// `/channel/UC…`, `/c/name`, `/user/name`), a bare `@handle` and a bare
/// `UC…` id. Anything else is [`Error::InvalidInput`].
pub fn parse_channel_ref(input: &str) -> Result<ChannelRef> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(Error::InvalidInput("empty channel link".to_string()));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!("not a channel link: {raw}")));
    }

    if let Some(handle) = raw.strip_prefix('@') {
        return valid_name(handle.trim_end_matches('/')).map(ChannelRef::Handle);
    }
    if is_channel_id(raw) {
        return Ok(ChannelRef::ChannelId(raw.to_string()));
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::InvalidInput(format!("not a channel link: {raw} ({e})")))?;

    let host = url.host_str().unwrap_or_default().to_lowercase();
    if !YOUTUBE_HOSTS.contains(&host.as_str()) {
        return Err(Error::InvalidInput(format!(
            "not a YouTube channel link: {raw}"
        )));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [first, ..] if first.starts_with('@') => {
            valid_name(&first[1..]).map(ChannelRef::Handle)
        }
        ["channel", id, ..] if is_channel_id(id) => Ok(ChannelRef::ChannelId(id.to_string())),
        ["c", name, ..] => valid_name(name).map(ChannelRef::Custom),
        ["user", name, ..] => valid_name(name).map(ChannelRef::User),
        _ => Err(Error::InvalidInput(format!(
            "not a YouTube channel link: {raw}"
        ))),
    }
}

/// `UC` followed by 22 URL-safe base64 characters.
pub fn is_channel_id(s: &str) -> bool {
    s.len() == 24
        && s.starts_with("UC")
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn valid_name(name: &str) -> Result<String> {
    let ok = !name.is_empty()
        && name.len() <= 100
        && !name.contains('@')
        && name
            .chars()
            .all(|c| !c.is_whitespace() && c != '/' && c != '?' && c != '#');
    if ok {
        Ok(name.to_string())
    } else {
        Err(Error::InvalidInput(format!("invalid channel name: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "UC_x5XG1OV2P6uZZ5FSM9Ttw";

    #[test]
    fn parses_supported_shapes() {
        let by_id = format!("https://www.youtube.com/channel/{ID}");
        let by_id_tab = format!("www.youtube.com/channel/{ID}/featured");
        let cases: Vec<(&str, ChannelRef)> = vec![
            (
                "https://www.youtube.com/@TechnoGamerz",
                ChannelRef::Handle("TechnoGamerz".into()),
            ),
            (
                "youtube.com/@TechnoGamerz/videos",
                ChannelRef::Handle("TechnoGamerz".into()),
            ),
            (
                "https://m.youtube.com/@techno.gamerz?si=abc",
                ChannelRef::Handle("techno.gamerz".into()),
            ),
            ("@TechnoGamerz", ChannelRef::Handle("TechnoGamerz".into())),
            (by_id.as_str(), ChannelRef::ChannelId(ID.into())),
            (by_id_tab.as_str(), ChannelRef::ChannelId(ID.into())),
            (ID, ChannelRef::ChannelId(ID.into())),
            (
                "youtube.com/c/TechnoGamerz",
                ChannelRef::Custom("TechnoGamerz".into()),
            ),
            (
                "http://youtube.com/user/GoogleDevelopers",
                ChannelRef::User("GoogleDevelopers".into()),
            ),
            (
                "  https://www.youtube.com/@Spaces  ",
                ChannelRef::Handle("Spaces".into()),
            ),
        ];

        for (input, expected) in &cases {
            assert_eq!(&parse_channel_ref(input).unwrap(), expected, "input: {input}");
        }
    }

    #[test]
    fn rejects_malformed_input() {
        let bad = [
            "",
            "   ",
            "hello world",
            "https://example.com/@someone",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/",
            "https://www.youtube.com/@",
            "https://www.youtube.com/channel/not-an-id",
            "@",
            "ftp://",
        ];
        for input in bad {
            let err = parse_channel_ref(input).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "input: {input:?}");
        }
    }

    #[test]
    fn source_id_round_trips_for_unresolved_refs() {
        for r in [
            ChannelRef::ChannelId(ID.into()),
            ChannelRef::Handle("abc".into()),
            ChannelRef::Custom("abc".into()),
            ChannelRef::User("abc".into()),
        ] {
            assert_eq!(ChannelRef::from_source_id(&r.source_id()).unwrap(), r);
        }
        assert!(ChannelRef::from_source_id(&SourceId::new("garbage")).is_err());
    }

    #[test]
    fn channel_url_uses_base() {
        let r = ChannelRef::Handle("abc".into());
        assert_eq!(
            r.channel_url("https://www.youtube.com/"),
            "https://www.youtube.com/@abc"
        );
    }
}
