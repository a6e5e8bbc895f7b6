use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use fetchlinks::{
    user_agent, Extension, FetchError, FetchLinks, FetchOptions, Fetcher, PostInfo,
};
use scraper::{Html, Selector};
use url::Url;

// Serves one canned response per connection and hands back the request heads.
fn serve(responses: Vec<Vec<u8>>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }
            requests.push(head);

            stream.write_all(&response).unwrap();
            stream.flush().unwrap();
        }
        requests
    });

    (addr, handle)
}

fn ok_response(content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

fn base_href(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("html > head > base").unwrap();
    let hrefs: Vec<String> = document
        .select(&selector)
        .filter_map(|base| base.value().attr("href").map(str::to_string))
        .collect();
    assert!(hrefs.len() <= 1, "more than one base element: {hrefs:?}");
    hrefs.into_iter().next()
}

#[test]
fn http_fetch_sends_identity_and_decodes_header_charset() {
    let (addr, server) = serve(vec![ok_response(
        "text/html; charset=iso-8859-1",
        b"<html><body><p>Caf\xE9</p><a href=\"next.html\">next</a></body></html>",
    )]);
    let feed = "http://example.com/feed.xml";
    let link = format!("{addr}/posts/1");

    let fetcher = Fetcher::new(&FetchOptions::default()).unwrap();
    let result = fetcher.fetch(feed, &link).unwrap();

    assert_eq!(result.final_url.as_str(), link);
    assert_eq!(base_href(&result.content).as_deref(), Some(link.as_str()));
    assert!(result.content.contains("<p>Caf\u{e9}</p>"));

    let requests = server.join().unwrap();
    let request = requests[0].to_ascii_lowercase();
    assert!(request.starts_with("get /posts/1 "));
    assert!(request.contains(&format!("user-agent: {}", user_agent().to_ascii_lowercase())));
    assert!(request.contains(&format!("referer: {feed}")));
}

#[test]
fn empty_feed_url_sends_no_referer() {
    let (addr, server) = serve(vec![ok_response("text/html; charset=utf-8", b"<p>hi</p>")]);

    let fetcher = Fetcher::new(&FetchOptions::default()).unwrap();
    fetcher.fetch("", &format!("{addr}/no-feed")).unwrap();

    let requests = server.join().unwrap();
    let request = requests[0].to_ascii_lowercase();
    assert!(request.contains("user-agent: "));
    assert!(!request.contains("referer:"), "unexpected referer in {request:?}");
}

#[test]
fn base_points_at_the_redirect_target() {
    let redirect = b"HTTP/1.1 302 Found\r\nLocation: /moved\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
    let (addr, server) = serve(vec![
        redirect,
        ok_response("text/html", b"<meta charset=\"utf-8\"><h1>\xE2\x98\xBA</h1>"),
    ]);

    let content = fetchlinks::fetch_and_normalize("", &format!("{addr}/old")).unwrap();

    assert_eq!(base_href(&content), Some(format!("{addr}/moved")));
    assert!(content.contains("<h1>\u{263a}</h1>"));
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn error_status_surfaces_as_fetch_error() {
    let not_found = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
    let (addr, server) = serve(vec![not_found]);

    let err = fetchlinks::fetch_and_normalize("", &format!("{addr}/gone")).unwrap_err();

    assert!(matches!(err, FetchError::Http(_)));
    server.join().unwrap();
}

#[test]
fn local_file_is_decoded_from_its_meta_charset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.html");
    std::fs::write(
        &path,
        b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head><body>\x93quoted\x94</body></html>",
    )
    .unwrap();
    let link = Url::from_file_path(&path).unwrap();

    let fetcher = Fetcher::new(&FetchOptions::default()).unwrap();
    let result = fetcher.fetch("http://example.com/feed.xml", link.as_str()).unwrap();

    assert_eq!(result.final_url, link);
    assert_eq!(base_href(&result.content).as_deref(), Some(link.as_str()));
    assert!(result.content.contains("\u{201c}quoted\u{201d}"));
}

#[test]
fn unreachable_link_leaves_an_empty_placeholder() {
    // Grab a free port, then close it so nothing is listening.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let link = format!("http://127.0.0.1:{port}/post");

    let fetcher = Fetcher::new(&FetchOptions::default()).unwrap();
    assert!(matches!(fetcher.fetch("", &link), Err(FetchError::Http(_))));

    let extension = FetchLinks::new(&FetchOptions::default()).unwrap();
    let mut post = PostInfo {
        from_addr: "http://example.com/feed.xml".to_string(),
        post_link: Some(link),
        description: "<p>intro</p><div class=\"fetchlinks\" /><p>outro</p>".to_string(),
    };

    extension.begin_retrieve();
    assert!(extension.pre_process_item(&mut post));
    extension.post_process_item(&post);
    extension.end_retrieve();

    assert_eq!(post.description, "<p>intro</p><p>outro</p>");
}

#[test]
fn extension_splices_fetched_page_into_post() {
    let (addr, server) = serve(vec![ok_response(
        "text/html; charset=utf-8",
        b"<h1>Hello</h1>",
    )]);
    let link = format!("{addr}/hello");

    let extension = FetchLinks::new(&FetchOptions::default()).unwrap();
    let mut post = PostInfo {
        from_addr: "http://example.com/feed.xml".to_string(),
        post_link: Some(link.clone()),
        description: "<div class=\"fetchlinks\" />".to_string(),
    };

    assert!(extension.pre_process_item(&mut post));
    server.join().unwrap();

    assert_eq!(base_href(&post.description), Some(link));
    assert!(post.description.contains("<h1>Hello</h1>"));
}

#[test]
fn one_fetcher_serves_concurrent_callers() {
    let bodies: Vec<Vec<u8>> = (0..3)
        .map(|_| ok_response("text/html; charset=utf-8", b"<p>shared</p>"))
        .collect();
    let (addr, server) = serve(bodies);
    let fetcher = Fetcher::new(&FetchOptions::default()).unwrap();

    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let fetcher = &fetcher;
                let link = format!("{addr}/item/{i}");
                scope.spawn(move || fetcher.fetch_and_normalize("", &link).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|html| html.contains("<p>shared</p>")));
    assert_eq!(server.join().unwrap().len(), 3);
}
