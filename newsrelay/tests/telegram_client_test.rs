use mockito::Matcher;
use newsrelay::bot::{Reply, WebAppButton};
use newsrelay::telegram::{BotApi, TelegramClient};
use serde_json::json;

#[tokio::test]
async fn test_get_updates_parses_messages() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/botTEST/getUpdates")
        .match_body(Matcher::PartialJson(json!({ "offset": 5, "timeout": 0 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "ok": true,
                "result": [
                    {
                        "update_id": 5,
                        "message": {
                            "message_id": 10,
                            "chat": { "id": 42, "type": "private" },
                            "text": "/current"
                        }
                    },
                    {
                        "update_id": 6,
                        "message": {
                            "message_id": 11,
                            "chat": { "id": 42, "type": "private" },
                            "web_app_data": { "data": "{\"action\":\"request_news\"}", "button_text": "Open" }
                        }
                    },
                    { "update_id": 7, "edited_message": { "message_id": 1 } }
                ]
            }"#,
        )
        .create_async()
        .await;

    let client = TelegramClient::new(server.url(), "TEST");
    let updates = client.get_updates(Some(5), 0).await.expect("get updates");

    assert_eq!(updates.len(), 3);
    let first = updates[0].message.as_ref().expect("message");
    assert_eq!(first.chat.id, 42);
    assert_eq!(first.text.as_deref(), Some("/current"));

    let second = updates[1].message.as_ref().expect("message");
    assert!(second.text.is_none());
    assert_eq!(
        second.web_app_data.as_ref().map(|d| d.data.as_str()),
        Some(r#"{"action":"request_news"}"#)
    );

    assert!(updates[2].message.is_none());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_message_with_web_app_button() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/botTEST/sendMessage")
        .match_body(Matcher::PartialJson(json!({
            "chat_id": 42,
            "text": "Откройте WebApp:",
            "reply_markup": {
                "inline_keyboard": [[
                    { "text": "Открыть WebApp", "web_app": { "url": "https://webapp.example.com" } }
                ]]
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": true, "result": {"message_id": 99, "chat": {"id": 42}}}"#)
        .create_async()
        .await;

    let client = TelegramClient::new(server.url(), "TEST");
    let reply = Reply {
        text: "Откройте WebApp:".to_string(),
        button: Some(WebAppButton {
            text: "Открыть WebApp".to_string(),
            url: "https://webapp.example.com".to_string(),
        }),
    };

    client.send_message(42, &reply).await.expect("send message");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_plain_message_has_no_markup() {
    let mut server = mockito::Server::new_async().await;

    // any reply_markup key in the body would fail this matcher
    let mock = server
        .mock("POST", "/botTEST/sendMessage")
        .match_body(Matcher::Json(json!({ "chat_id": 1, "text": "hello" })))
        .with_status(200)
        .with_body(r#"{"ok": true, "result": {"message_id": 1}}"#)
        .create_async()
        .await;

    let client = TelegramClient::new(server.url(), "TEST");
    client
        .send_message(1, &Reply::text("hello"))
        .await
        .expect("send message");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/botTEST/getUpdates")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#)
        .create_async()
        .await;

    let client = TelegramClient::new(server.url(), "TEST");
    let err = client.get_updates(None, 0).await.unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains("Unauthorized"), "{msg}");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_garbage_body_is_an_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/botTEST/getUpdates")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let client = TelegramClient::new(server.url(), "TEST");
    let err = client.get_updates(None, 0).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse"));
}

#[tokio::test]
async fn test_request_timeout() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/botTEST/sendMessage")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let client = TelegramClient::new(server.url(), "TEST").with_request_timeout(1);
    let result = client.send_message(1, &Reply::text("hi")).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("timed out"));
}
