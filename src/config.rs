// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "io.github.photofeed.PhotoFeed";

/// Directory name under the XDG data dir for the store and blobs
pub const DATA_DIR_NAME: &str = "photofeed";

/// Items fetched per page for posts and favorites feeds
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Maximum profiles returned by a username search
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
