//! Page extraction from playlist JSON.
//!
//! The item list can sit at one of several fixed locations depending on
//! whether the JSON came embedded in the playlist HTML or from a
//! continuation POST. Each location is a [`ShapeMatcher`]; matchers are tried
//! in order and the first one that resolves to an array wins.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use super::Page;
use super::constants::WATCH_PREFIX;

/// Which JSON layout a page matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageShape {
    /// Initial data of a playlist without submenus.
    Initial,
    /// Initial data of a playlist whose first section is a submenu.
    InitialWithSubmenu,
    /// Body of a continuation response.
    Continuation,
}

/// A fixed JSON pointer to an item array.
#[derive(Debug, Clone, Copy)]
pub struct ShapeMatcher {
    /// Layout this matcher recognises.
    pub shape: PageShape,
    /// RFC 6901 pointer to the item array.
    pub pointer: &'static str,
}

impl ShapeMatcher {
    /// Returns the item array if `root` has this layout.
    #[must_use]
    pub fn items<'a>(&self, root: &'a Value) -> Option<&'a Vec<Value>> {
        root.pointer(self.pointer)?.as_array()
    }
}

/// Matchers in the order they are tried.
pub const SHAPES: [ShapeMatcher; 3] = [
    ShapeMatcher {
        shape: PageShape::Initial,
        pointer: "/contents/twoColumnBrowseResultsRenderer/tabs/0/tabRenderer/content\
                  /sectionListRenderer/contents/0/itemSectionRenderer/contents/0\
                  /playlistVideoListRenderer/contents",
    },
    ShapeMatcher {
        shape: PageShape::InitialWithSubmenu,
        pointer: "/contents/twoColumnBrowseResultsRenderer/tabs/0/tabRenderer/content\
                  /sectionListRenderer/contents/1/itemSectionRenderer/contents/0\
                  /playlistVideoListRenderer/contents",
    },
    ShapeMatcher {
        shape: PageShape::Continuation,
        pointer: "/onResponseReceivedActions/0/appendContinuationItemsAction/continuationItems",
    },
];

const CONTINUATION_TOKEN: &str =
    "/continuationItemRenderer/continuationEndpoint/continuationCommand/token";
const VIDEO_ID: &str = "/playlistVideoRenderer/videoId";

/// Finds the first matching layout and its item array.
#[must_use]
pub fn match_shape(root: &Value) -> Option<(PageShape, &Vec<Value>)> {
    SHAPES
        .iter()
        .find_map(|matcher| matcher.items(root).map(|items| (matcher.shape, items)))
}

/// Extracts a page from raw JSON text.
///
/// Text that is not JSON, or JSON of no known layout, gives an empty page
/// with no continuation token.
#[must_use]
pub fn extract_page(raw: &str) -> Page {
    match serde_json::from_str::<Value>(raw) {
        Ok(root) => extract_page_value(&root),
        Err(error) => {
            warn!(error = %error, "page is not valid JSON; treating as end of playlist");
            Page::default()
        }
    }
}

/// Extracts a page from already parsed JSON.
#[must_use]
pub fn extract_page_value(root: &Value) -> Page {
    let Some((shape, items)) = match_shape(root) else {
        warn!("unrecognised page shape; treating as end of playlist");
        return Page::default();
    };

    let (items, continuation_token) = match items.split_last() {
        Some((last, rest)) => match continuation_token(last) {
            Some(token) => (rest, Some(token)),
            None => (items.as_slice(), None),
        },
        None => (items.as_slice(), None),
    };

    let mut seen = HashSet::new();
    let mut item_ids = Vec::with_capacity(items.len());
    for item in items {
        let Some(video_id) = item.pointer(VIDEO_ID).and_then(Value::as_str) else {
            debug!("skipping playlist entry without a videoId");
            continue;
        };
        let id = format!("{WATCH_PREFIX}{video_id}");
        if seen.insert(id.clone()) {
            item_ids.push(id);
        }
    }

    debug!(
        ?shape,
        items = item_ids.len(),
        has_continuation = continuation_token.is_some(),
        "page extracted"
    );
    Page {
        item_ids,
        continuation_token,
    }
}

fn continuation_token(item: &Value) -> Option<String> {
    item.pointer(CONTINUATION_TOKEN)
        .and_then(Value::as_str)
        .map(str::to_string)
}
