/// Wire format tests
///
/// Checks the JSON shapes exchanged with clients and stored in the
/// content-addressed log against hand-written fixtures, independent of
/// the server's own types.
use serde_json::{json, Value};

fn sample_envelope() -> Value {
    json!({
        "data": {
            "message": {
                "type": "Broadcast",
                "previousMessageHash": format!("0x{}", "00".repeat(32)),
                "sender": "0x00112233445566778899aabbccddeeff00112233",
                "content": "hello world",
                "category": "general",
                "tags": ["intro"],
                "medias": [{"url": "http://gateway/Qm123", "type": "image/png"}],
                "inReplyTo": {"user": "0xaa", "hash": "0xbb"}
            },
            "timestamp": {
                "data": {
                    "timestamp": "1700000000000",
                    "hash": format!("0x{}", "ab".repeat(32))
                },
                "signature": format!("0x{}", "cd".repeat(65))
            }
        },
        "signature": format!("0x{}", "ef".repeat(65))
    })
}

#[test]
fn test_envelope_shape() {
    let envelope = sample_envelope();

    // The sender signs data as a whole; both signatures are siblings of
    // what they sign, never inside it
    assert!(envelope["data"]["message"].is_object());
    assert!(envelope["data"]["timestamp"]["data"].is_object());
    assert!(envelope["data"]["timestamp"]["signature"].is_string());
    assert!(envelope["signature"].is_string());

    // The timestamped hash binds the timestamp to the message
    let hash = envelope["data"]["timestamp"]["data"]["hash"]
        .as_str()
        .unwrap();
    assert!(hash.starts_with("0x"));
    assert_eq!(hash.len(), 66);
}

#[test]
fn test_message_kinds_are_internally_tagged() {
    let broadcast = sample_envelope();
    assert_eq!(broadcast["data"]["message"]["type"], "Broadcast");

    let control = json!({
        "type": "Control",
        "previousMessageHash": format!("0x{}", "00".repeat(32)),
        "sender": "0x00112233445566778899aabbccddeeff00112233",
        "operation": "like",
        "data": "{\"messageHash\": \"0xbb\"}"
    });
    assert_eq!(control["type"], "Control");
    // Operation payloads travel as JSON-encoded strings
    let data: Value = serde_json::from_str(control["data"].as_str().unwrap()).unwrap();
    assert_eq!(data["messageHash"], "0xbb");
}

#[test]
fn test_control_operations_are_camel_case_strings() {
    for op in [
        "onboard",
        "offboard",
        "hideMessage",
        "like",
        "dislike",
        "follow",
        "unfollow",
    ] {
        let value = json!(op);
        assert!(value.is_string());
    }
}

#[test]
fn test_index_page_shape() {
    let page = json!({
        "messages": [
            {
                "link": "http://gateway/QmMsg1",
                "hash": format!("0x{}", "ab".repeat(32)),
                "metadata": {
                    "publishedAt": 1700000000000i64,
                    "publishedBy": "drops",
                    "link": format!("http://drops.example/messages/0x{}", "ab".repeat(32))
                }
            }
        ],
        "previousPage": "QmOldPage",
        "totalCount": 101
    });

    let messages = page["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0]["link"].as_str().unwrap().contains("Qm"));
    assert!(messages[0]["metadata"]["publishedAt"].is_i64());

    // publishedBy names the hosting service, not the sender's address
    let published_by = messages[0]["metadata"]["publishedBy"].as_str().unwrap();
    assert!(!published_by.starts_with("0x"));
    // The permalink points at the service's message page for this hash
    let permalink = messages[0]["metadata"]["link"].as_str().unwrap();
    assert!(permalink.ends_with(messages[0]["hash"].as_str().unwrap()));

    // totalCount spans the whole chain, not just this page
    assert!(page["totalCount"].as_u64().unwrap() > messages.len() as u64);
}

#[test]
fn test_error_body_shape() {
    let error = json!({
        "success": false,
        "error": "User not registered with this service"
    });
    assert_eq!(error["success"], false);
    assert!(error["error"].is_string());
}

#[test]
fn test_service_discovery_document_shape() {
    let doc = json!({
        "index": "http://gateway/ipns/k51abc",
        "addMessageApi": "http://drops.example/api/add-message"
    });
    assert!(doc["index"].as_str().unwrap().contains("ipns"));
    assert!(doc["addMessageApi"]
        .as_str()
        .unwrap()
        .ends_with("/add-message"));
}
