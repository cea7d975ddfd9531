//! Response integration tests: charset decoding, regex and CSS extraction
//! and JSON handling over real wire exchanges.

use husky::{RequestOption, Session};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html lang="zh-CN">
	<head>
	<title>Husky</title>
	</head>
	<body>
	<li><a href="/convenient/">is a convenient</a></li>
	<li><a href="/easy/">and easy to use http client</a></li>
	<li><a href="/author/">南北</a></li>
	<li><a href="/time/">2019-06-21</a></li>
	</body>
	</html>"#;

async fn start_page_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(PAGE.as_bytes(), "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let (gbk, _, _) = encoding_rs::GBK.encode(PAGE);
    Mock::given(method("GET"))
        .and(path("/GBK"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_bytes(gbk.into_owned()),
        )
        .mount(&server)
        .await;

    let (gb18030, _, _) = encoding_rs::GB18030.encode(PAGE);
    Mock::given(method("GET"))
        .and(path("/GB18030"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_bytes(gb18030.into_owned()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/latin1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_bytes(vec![
                    b'<', b'i', b'>', 0xE9, 0xE8, b'<', b'/', b'i', b'>',
                ]),
        )
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn test_re_extraction_over_the_wire() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session.get(&format!("{}/", server.uri()), []).await.unwrap();

    let dates = resp.re(r"\d{4}-\d{2}-\d{2}").unwrap();
    assert_eq!(dates[0], "2019-06-21");

    let groups = resp.re_submatch("<a href.*?>(.*?)</a>").unwrap();
    assert_eq!(groups.len(), 4);
    assert_eq!(groups[3][0], "2019-06-21");
}

#[tokio::test]
async fn test_css_extraction_over_the_wire() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session.get(&format!("{}/", server.uri()), []).await.unwrap();

    assert_eq!(resp.css("a").first().text(), "is a convenient");
    assert_eq!(resp.css("a").at(2).text(), "南北");
    assert_eq!(resp.css("a").first().attr_or("href", ""), "/convenient/");
    assert_eq!(
        resp.css("body").css("li").css(r#"a[href="/time/"]"#).first().text(),
        "2019-06-21"
    );
    assert_eq!(resp.css("a").at(9).text(), "");
}

#[tokio::test]
async fn test_gbk_decoding_matches_source_text() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session
        .get(&format!("{}/GBK", server.uri()), [])
        .await
        .unwrap();
    let groups = resp
        .re_submatch(r#"<a href="/author/">(.*?)</a>"#)
        .unwrap();
    assert!(groups.is_empty() || groups[0][0] != "南北");

    let _ = resp.text_with_charset("GBK");
    let groups = resp
        .re_submatch(r#"<a href="/author/">(.*?)</a>"#)
        .unwrap();
    assert_eq!(groups[0][0], "南北");
}

#[tokio::test]
async fn test_gb18030_decoding_matches_source_text() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session
        .get(&format!("{}/GB18030", server.uri()), [])
        .await
        .unwrap();
    let _ = resp.text_with_charset("GB18030");
    let groups = resp
        .re_submatch(r#"<a href="/author/">(.*?)</a>"#)
        .unwrap();
    assert_eq!(groups[0][0], "南北");
}

#[tokio::test]
async fn test_latin1_decoding() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session
        .get(&format!("{}/latin1", server.uri()), [])
        .await
        .unwrap();
    assert_eq!(resp.text_with_charset("latin1"), "<i>éè</i>");
}

#[tokio::test]
async fn test_unsupported_charset_is_empty_over_the_wire() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session.get(&format!("{}/", server.uri()), []).await.unwrap();
    assert_eq!(resp.text_with_charset("UTF-16"), "");
}

#[tokio::test]
async fn test_json_echo_roundtrip() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Student {
        name: String,
        age: u32,
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/json")
                .set_body_string(r#"{"name": "Xiao Ming", "age": 16}"#),
        )
        .mount(&server)
        .await;

    let session = Session::new();
    let body = RequestOption::json(&Student {
        name: "Xiao Ming".to_string(),
        age: 16,
    })
    .unwrap();
    let resp = session
        .post(&format!("{}/json", server.uri()), [body])
        .await
        .unwrap();

    let student: Student = resp.json().unwrap();
    assert_eq!(student.name, "Xiao Ming");
    assert_eq!(resp.json_get("name").unwrap(), "Xiao Ming");
    assert_eq!(resp.json_get("age").unwrap(), 16);
}

#[tokio::test]
async fn test_response_metadata() {
    let server = start_page_server().await;
    let session = Session::new();

    let resp = session.get(&format!("{}/", server.uri()), []).await.unwrap();
    assert_eq!(resp.status_code(), 200);
    assert!(resp.proto().starts_with("HTTP/"));
    assert!(resp.url().ends_with('/'));
    assert!(
        resp.headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("text/html")
    );
}

#[tokio::test]
async fn test_reply_cookie_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/set"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "flavor=snow; Path=/kennel")
                .set_body_string("ok"),
        )
        .mount(&server)
        .await;

    let session = Session::new();
    let resp = session.get(&format!("{}/set", server.uri()), []).await.unwrap();

    let cookie = resp
        .cookies()
        .iter()
        .find(|c| c.name == "flavor")
        .expect("reply cookie missing");
    assert_eq!(cookie.value, "snow");
    assert_eq!(cookie.path.as_deref(), Some("/kennel"));
}
