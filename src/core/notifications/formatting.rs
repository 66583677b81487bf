//! Formatting for mention notifications.
//!
//! Every channel describes the same mention in its own markup. Reddit-side
//! channels use markdown, the webhooks get Slack blocks or a Discord embed.

use crate::core::mentions::{ContentItem, ContentKind};
use serde_json::{json, Value};

pub const SLACK_COLOR: &str = "#FF4500"; // OrangeRed
pub const DISCORD_COLOR: u32 = 16711680; // #FF0000
pub const DISCORD_USERNAME: &str = "Moderator Mentions";
pub const DISCORD_AVATAR_URL: &str =
    "https://raw.githubusercontent.com/shiruken/mod-mentions/main/assets/avatar.jpg";

/// Everything a channel needs to describe one detected mention.
#[derive(Debug, Clone)]
pub struct MentionNotice {
    /// Mentioned moderators, in directory order
    pub moderators: Vec<String>,
    pub item: ContentItem,
    /// The author's cumulative mention count, this mention included
    pub author_count: u64,
}

impl MentionNotice {
    pub fn is_plural(&self) -> bool {
        self.moderators.len() > 1
    }
}

/// How a username list is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStyle {
    /// `u/name`
    Reddit,
    /// `<https://www.reddit.com/user/name|u/name>`
    Slack,
    /// `[u/name](https://www.reddit.com/user/name)`
    Discord,
}

pub fn user_url(username: &str) -> String {
    format!("https://www.reddit.com/user/{}", username)
}

pub fn format_username(username: &str, style: NameStyle) -> String {
    match style {
        NameStyle::Reddit => format!("u/{}", username),
        NameStyle::Slack => format!("<{}|u/{}>", user_url(username), username),
        NameStyle::Discord => format!("[u/{}]({})", username, user_url(username)),
    }
}

/// One name bare, two joined with "and", three or more with an Oxford comma.
pub fn format_usernames(usernames: &[String], style: NameStyle) -> String {
    let names: Vec<String> = usernames
        .iter()
        .map(|name| format_username(name, style))
        .collect();

    match names.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

/// Quote text in Reddit markdown, prefixing every line with `> `.
pub fn quote_text(text: &str) -> String {
    let quoted: Vec<String> = text.lines().map(|line| format!("> {}", line)).collect();
    format!("\n{}", quoted.join("\n"))
}

/// Render a count with thousands separators (`1234567` -> `1,234,567`).
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn plural_suffix(is_plural: bool) -> &'static str {
    if is_plural {
        "s"
    } else {
        ""
    }
}

/// "The moderator u/a has been mentioned in a post"
pub fn headline(notice: &MentionNotice, style: NameStyle) -> String {
    let plural = notice.is_plural();
    format!(
        "The moderator{} {} {} been mentioned in a {}",
        plural_suffix(plural),
        format_usernames(&notice.moderators, style),
        if plural { "have" } else { "has" },
        notice.item.kind
    )
}

pub fn report_reason(notice: &MentionNotice) -> String {
    format!(
        "Mentions moderator{} {}",
        plural_suffix(notice.is_plural()),
        format_usernames(&notice.moderators, NameStyle::Reddit)
    )
}

/// Note appended for authors who have mentioned moderators before.
pub fn repeat_offender_note(notice: &MentionNotice) -> Option<String> {
    if notice.author_count <= 1 {
        return None;
    }
    Some(format!(
        "u/{} has mentioned r/{} moderators {} times",
        notice.item.author_name,
        notice.item.subreddit_name,
        format_count(notice.author_count)
    ))
}

pub fn modmail_subject(notice: &MentionNotice) -> String {
    format!("Moderator{} Mentioned", plural_suffix(notice.is_plural()))
}

pub fn modmail_body(notice: &MentionNotice) -> String {
    let item = &notice.item;
    let mut body = format!(
        "{}:\n\n* **Link:** {}\n\n* **User:** u/{}",
        headline(notice, NameStyle::Reddit),
        item.permalink_url(),
        item.author_name
    );

    if let (ContentKind::Post, Some(title)) = (item.kind, &item.title) {
        body.push_str(&format!("\n\n* **Title:** {}", title));
    }
    if let Some(text) = item.body_text() {
        body.push_str(&format!("\n\n* **Body:** {}", quote_text(text)));
    }
    if let Some(note) = repeat_offender_note(notice) {
        body.push_str(&format!("\n\n^({})", note));
    }
    body
}

pub fn slack_payload(notice: &MentionNotice) -> Value {
    let item = &notice.item;
    let mut details = format!(
        "{}\n*User:* {}",
        item.permalink_url(),
        format_username(&item.author_name, NameStyle::Slack)
    );

    if let (ContentKind::Post, Some(title)) = (item.kind, &item.title) {
        details.push_str(&format!("\n*Title:* {}", title));
    }
    if let Some(text) = item.body_text() {
        details.push_str(&format!("\n*Body:* {}", text));
    }
    if let Some(note) = repeat_offender_note(notice) {
        details.push_str(&format!("\n\n_{}_", note));
    }

    json!({
        "blocks": [
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": headline(notice, NameStyle::Slack),
                }
            }
        ],
        "attachments": [
            {
                "color": SLACK_COLOR,
                "blocks": [
                    {
                        "type": "context",
                        "elements": [
                            {
                                "type": "mrkdwn",
                                "text": details,
                            }
                        ]
                    }
                ]
            }
        ]
    })
}

pub fn discord_payload(notice: &MentionNotice) -> Value {
    let item = &notice.item;
    let mut fields = vec![
        json!({ "name": "Link", "value": item.permalink_url() }),
        json!({
            "name": "User",
            "value": format_username(&item.author_name, NameStyle::Discord),
        }),
    ];

    if let (ContentKind::Post, Some(title)) = (item.kind, &item.title) {
        fields.push(json!({ "name": "Title", "value": title }));
    }
    if let Some(text) = item.body_text() {
        fields.push(json!({ "name": "Body", "value": text }));
    }

    // Discord rejects an empty footer, a zero-width space keeps the layout stable
    let footer = repeat_offender_note(notice).unwrap_or_else(|| "\u{200b}".to_string());

    json!({
        "username": DISCORD_USERNAME,
        "avatar_url": DISCORD_AVATAR_URL,
        "content": headline(notice, NameStyle::Discord),
        "embeds": [
            {
                "color": DISCORD_COLOR,
                "fields": fields,
                "footer": { "text": footer },
            }
        ]
    })
}
