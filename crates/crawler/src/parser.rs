use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::{extractor, Endpoints, FetchContext, Transport};

static KEYWORDS_META: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="keywords"]"#));
static ARTIST_DESC: Lazy<Selector> = Lazy::new(|| selector("div.n-artdesc"));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img[src]"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static OG_ARTIST: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:music:artist"]"#));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:image"]"#));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Fields scraped from an artist description page. `None` means the source
/// element was not on the page at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistPage {
    pub name: Option<String>,
    pub biography: Option<String>,
    pub profile_img: Option<String>,
}

/// Open Graph fields from a song page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongMeta {
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub cover_img: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongPage {
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub cover_img: Option<String>,
    /// Empty when the lyric endpoint failed or had nothing usable.
    pub lyrics: Vec<String>,
}

pub fn parse_artist_page(html: &str) -> ArtistPage {
    let document = Html::parse_document(html);

    let name = meta_content(&document, &KEYWORDS_META);
    let biography = document
        .select(&ARTIST_DESC)
        .next()
        .map(|desc| stripped_text(&desc));
    let profile_img = document
        .select(&IMG)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| is_absolute_http(src))
        .map(str::to_string);

    ArtistPage {
        name,
        biography,
        profile_img,
    }
}

pub fn parse_song_meta(html: &str) -> SongMeta {
    let document = Html::parse_document(html);

    SongMeta {
        name: meta_content(&document, &OG_TITLE),
        artist_name: meta_content(&document, &OG_ARTIST),
        cover_img: meta_content(&document, &OG_IMAGE),
    }
}

/// Song metadata from the page plus lyrics from the lyric endpoint.
///
/// Lyric failures of any kind degrade to an empty list.
pub async fn parse_song_page<T: Transport>(
    ctx: &FetchContext<T>,
    endpoints: &Endpoints,
    html: &str,
    song_id: &str,
) -> SongPage {
    let meta = parse_song_meta(html);

    let lyric_url = endpoints.lyric_url(song_id);
    let lyrics = match ctx.fetch_api_text(&lyric_url).await {
        Ok(body) => match extractor::parse_lyric_response(&body) {
            Ok(lines) => lines,
            Err(e) => {
                debug!("No usable lyrics for song {}: {}", song_id, e);
                Vec::new()
            }
        },
        Err(e) => {
            warn!("Lyric request for song {} failed: {}", song_id, e);
            Vec::new()
        }
    };

    SongPage {
        name: meta.name,
        artist_name: meta.artist_name,
        cover_img: meta.cover_img,
        lyrics,
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|meta| meta.value().attr("content").unwrap_or("").trim().to_string())
}

// Each text node trimmed, then concatenated with no separator.
fn stripped_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_absolute_http(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIST_HTML: &str = r#"
        <html>
        <head>
            <meta name="keywords" content=" 周杰伦 ">
        </head>
        <body>
            <img src="/static/logo.png">
            <img src="https://p1.music.126.net/avatar.jpg">
            <div class="n-artdesc">
                <h2>简介</h2>
                <p>  华语流行乐男歌手。 </p>
                <p>音乐人。</p>
            </div>
        </body>
        </html>
    "#;

    #[test]
    fn test_artist_page_fields() {
        let page = parse_artist_page(ARTIST_HTML);

        assert_eq!(page.name.as_deref(), Some("周杰伦"));
        assert_eq!(page.biography.as_deref(), Some("简介华语流行乐男歌手。音乐人。"));
        assert_eq!(
            page.profile_img.as_deref(),
            Some("https://p1.music.126.net/avatar.jpg")
        );
    }

    #[test]
    fn test_artist_page_missing_elements() {
        let page = parse_artist_page("<html><body><img src='/relative.png'></body></html>");
        assert_eq!(page, ArtistPage::default());

        let page = parse_artist_page(
            r#"<html><head><meta name="keywords"></head><body><div class="n-artdesc"> </div></body></html>"#,
        );
        assert_eq!(page.name.as_deref(), Some(""));
        assert_eq!(page.biography.as_deref(), Some(""));
        assert_eq!(page.profile_img, None);
    }

    #[test]
    fn test_song_meta() {
        let html = r#"
            <html><head>
                <meta property="og:title" content="晴天">
                <meta property="og:music:artist" content="周杰伦">
                <meta property="og:image" content="https://p2.music.126.net/cover.jpg">
            </head><body></body></html>
        "#;

        let meta = parse_song_meta(html);
        assert_eq!(meta.name.as_deref(), Some("晴天"));
        assert_eq!(meta.artist_name.as_deref(), Some("周杰伦"));
        assert_eq!(meta.cover_img.as_deref(), Some("https://p2.music.126.net/cover.jpg"));

        assert_eq!(parse_song_meta("<html></html>"), SongMeta::default());
    }
}
