use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use minijinja::Environment;
use serde::Serialize;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    En,
    ZhCn,
}

impl Locale {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::ZhCn => "zh-CN",
        }
    }

    const fn catalog(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::En => EN,
            Self::ZhCn => ZH_CN,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported locale: {0}")]
pub struct UnknownLocale(pub String);

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "en" | "en-us" => Ok(Self::En),
            "zh" | "zh-cn" => Ok(Self::ZhCn),
            _ => Err(UnknownLocale(value.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("message template {key} failed: {source}")]
    Template {
        key: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Localized reply and notification texts.
pub struct Messages {
    env: Environment<'static>,
    locale: Locale,
}

impl fmt::Debug for Messages {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Messages")
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

impl Messages {
    /// # Errors
    /// Returns an error if a catalog template does not parse.
    pub fn new(locale: Locale) -> Result<Self, MessageError> {
        let mut env = Environment::new();
        for (key, source) in locale.catalog() {
            env.add_template(key, source)
                .map_err(|source| MessageError::Template {
                    key: (*key).to_string(),
                    source,
                })?;
        }

        Ok(Self { env, locale })
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// # Errors
    /// Returns an error for unknown keys or when rendering fails.
    pub fn render<C: Serialize>(&self, key: &str, context: C) -> Result<String, MessageError> {
        self.env
            .get_template(key)
            .and_then(|template| template.render(context))
            .map_err(|source| MessageError::Template {
                key: key.to_string(),
                source,
            })
    }
}

/// Renders a service timestamp for humans; unparseable input is returned as-is.
#[must_use]
pub fn format_time(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&Utc).format(TIME_FORMAT).to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.and_utc().format(TIME_FORMAT).to_string();
    }
    trimmed.to_string()
}

const EN: &[(&str, &str)] = &[
    ("project-name-required", "Please provide a project name."),
    ("invalid-provider", "Unsupported provider: {{ provider }}."),
    (
        "project-not-found",
        "Project {{ provider }}/{{ name }} was not found.",
    ),
    (
        "release-not-found",
        "Release {{ version }} of {{ provider }}/{{ name }} was not found.",
    ),
    (
        "release-info",
        "{{ project.provider }}/{{ project.name }}\n\
         {% if release %}Version: {{ release.version }}\nReleased: {{ release.date }}\
         {% else %}No releases yet.{% endif %}\n{{ project.url }}",
    ),
    (
        "release-list",
        "Releases of {{ project.provider }}/{{ project.name }}:\
         {% for release in releases %}\n- {{ release.version }} ({{ release.date }})\
         {% else %}\nNo releases yet.{% endfor %}",
    ),
    (
        "release-note",
        "{{ note.title }}\n{{ note.message }}\n{{ note.url }}",
    ),
    (
        "remote-error",
        "The release service could not complete the request. Please try again later.",
    ),
    (
        "notification-disabled",
        "Release notifications are disabled.",
    ),
    (
        "webhook-not-found",
        "Webhook \"{{ webhook }}\" is not registered on NewReleases.",
    ),
    (
        "watch-success",
        "This channel now watches {{ provider }}/{{ name }}.",
    ),
    (
        "already-watching",
        "This channel already watches {{ provider }}/{{ name }}.",
    ),
    (
        "unwatch-success",
        "This channel no longer watches {{ provider }}/{{ name }}.",
    ),
    (
        "not-subscribed",
        "This channel does not watch {{ provider }}/{{ name }}.",
    ),
    (
        "subscription-list",
        "Watched projects:{% for subscription in subscriptions %}\n- {{ subscription.provider }}/{{ subscription.name }}{% endfor %}",
    ),
    ("no-subscriptions", "This channel watches no projects."),
    (
        "new-release",
        "{{ provider }}/{{ project }} released {{ version }} ({{ time }}).",
    ),
];

const ZH_CN: &[(&str, &str)] = &[
    ("project-name-required", "请提供项目名称。"),
    ("invalid-provider", "不支持的平台：{{ provider }}。"),
    ("project-not-found", "未找到项目 {{ provider }}/{{ name }}。"),
    (
        "release-not-found",
        "未找到 {{ provider }}/{{ name }} 的版本 {{ version }}。",
    ),
    (
        "release-info",
        "{{ project.provider }}/{{ project.name }}\n\
         {% if release %}版本：{{ release.version }}\n发布时间：{{ release.date }}\
         {% else %}暂无发布。{% endif %}\n{{ project.url }}",
    ),
    (
        "release-list",
        "{{ project.provider }}/{{ project.name }} 的发布列表：\
         {% for release in releases %}\n- {{ release.version }}（{{ release.date }}）\
         {% else %}\n暂无发布。{% endfor %}",
    ),
    (
        "release-note",
        "{{ note.title }}\n{{ note.message }}\n{{ note.url }}",
    ),
    ("remote-error", "NewReleases 服务请求失败，请稍后再试。"),
    ("notification-disabled", "发布通知功能未启用。"),
    (
        "webhook-not-found",
        "NewReleases 上未注册名为 \"{{ webhook }}\" 的 Webhook。",
    ),
    ("watch-success", "本频道已订阅 {{ provider }}/{{ name }}。"),
    ("already-watching", "本频道已经订阅了 {{ provider }}/{{ name }}。"),
    ("unwatch-success", "本频道已取消订阅 {{ provider }}/{{ name }}。"),
    ("not-subscribed", "本频道未订阅 {{ provider }}/{{ name }}。"),
    (
        "subscription-list",
        "已订阅的项目：{% for subscription in subscriptions %}\n- {{ subscription.provider }}/{{ subscription.name }}{% endfor %}",
    ),
    ("no-subscriptions", "本频道没有订阅任何项目。"),
    (
        "new-release",
        "{{ provider }}/{{ project }} 发布了新版本 {{ version }}（{{ time }}）。",
    ),
];
