use serde::Deserialize;

/// One item as served by `GET /v0/item/<id>.json`.
///
/// Every field except `id` is optional upstream: deleted items carry little
/// more than an id, jobs have no score, comments have no title. Unknown
/// fields (`parent`, `parts`, `poll`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawItem {
    pub id: u64,
    /// `story`, `job`, `poll`, `pollopt` or `comment`.
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub title: Option<String>,
    /// External link. Absent for self-posts (Ask HN, most polls).
    pub url: Option<String>,
    /// Author handle.
    pub by: Option<String>,
    pub score: Option<u64>,
    /// Creation time, Unix seconds.
    pub time: Option<i64>,
    /// HTML body of self-posts.
    pub text: Option<String>,
    /// Total comment count.
    pub descendants: Option<u64>,
    /// Direct replies, in ranked display order.
    #[serde(default)]
    pub kids: Vec<u64>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub dead: bool,
}

/// Ranked identifier lists published by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoryList {
    #[default]
    Top,
    New,
    Best,
    Ask,
    Show,
}

impl StoryList {
    /// Endpoint name below the API base, without the `.json` suffix.
    pub fn endpoint(self) -> &'static str {
        match self {
            StoryList::Top => "topstories",
            StoryList::New => "newstories",
            StoryList::Best => "beststories",
            StoryList::Ask => "askstories",
            StoryList::Show => "showstories",
        }
    }

    /// Channel title used when the config does not set one.
    pub fn default_title(self) -> &'static str {
        match self {
            StoryList::Top => "Hacker News Top Stories",
            StoryList::New => "Hacker News New Stories",
            StoryList::Best => "Hacker News Best Stories",
            StoryList::Ask => "Ask HN",
            StoryList::Show => "Show HN",
        }
    }

    /// What the list contains, for the default channel description.
    pub fn noun(self) -> &'static str {
        match self {
            StoryList::Top => "Top stories",
            StoryList::New => "New stories",
            StoryList::Best => "Best stories",
            StoryList::Ask => "Ask HN posts",
            StoryList::Show => "Show HN posts",
        }
    }
}
