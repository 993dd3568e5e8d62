use super::Broker;
use super::topic::Topic;
use crate::broker::message::Message;
use crate::client::Client;
use tokio::sync::mpsc;

fn message(topic: &str, payload: &str) -> Message {
    Message {
        topic: topic.to_string(),
        payload: payload.to_string(),
        timestamp: 0,
    }
}

#[test]
fn test_topic_new() {
    let topic = Topic::new("test_topic");
    assert_eq!(topic.name, "test_topic");
    assert!(topic.subscribers.is_empty());
}

#[test]
fn test_topic_subscribe_and_unsubscribe() {
    let mut topic = Topic::new("test_topic");
    topic.subscribe("client1".to_string());
    assert!(topic.subscribers.contains("client1"));

    topic.unsubscribe(&"client1".to_string());
    assert!(topic.is_empty());
}

#[test]
fn test_broker_new() {
    let broker = Broker::new();
    assert!(broker.topics.is_empty());
    assert!(broker.clients.is_empty());
}

#[test]
fn test_broker_register_and_remove_client() {
    let mut broker = Broker::default();
    let (tx, _) = mpsc::channel::<Message>(4);
    let client = Client::new(tx);
    let client_id = client.id.clone();

    broker.register_client(client);
    assert!(broker.clients.contains_key(&client_id));

    broker.remove_client(&client_id);
    assert!(!broker.clients.contains_key(&client_id));
}

#[test]
fn test_broker_subscribe_and_unsubscribe_drops_empty_topic() {
    let mut broker = Broker::default();
    let (tx, _) = mpsc::channel::<Message>(4);
    let client = Client::new(tx);
    let client_id = client.id.clone();
    broker.register_client(client);

    broker.subscribe("ping.result.a", client_id.clone());
    assert_eq!(broker.subscriber_count("ping.result.a"), 1);

    broker.unsubscribe("ping.result.a", &client_id);
    assert_eq!(broker.subscriber_count("ping.result.a"), 0);
    assert!(!broker.topics.contains_key("ping.result.a"));
}

#[test]
fn test_broker_publish_fans_out() {
    let mut broker = Broker::default();
    let mut receivers = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = mpsc::channel::<Message>(4);
        let client = Client::new(tx);
        broker.subscribe("ping.start", client.id.clone());
        broker.register_client(client);
        receivers.push(rx);
    }

    let delivered = broker.publish(message("ping.start", "hello"));
    assert_eq!(delivered, 3);
    for mut rx in receivers {
        let received = rx.try_recv().unwrap();
        assert_eq!(received.topic, "ping.start");
        assert_eq!(received.payload, "hello");
    }
}

#[test]
fn test_broker_publish_only_reaches_matching_topic() {
    let mut broker = Broker::default();
    let (tx, mut rx) = mpsc::channel::<Message>(4);
    let client = Client::new(tx);
    broker.subscribe("ping.result.a", client.id.clone());
    broker.register_client(client);

    assert_eq!(broker.publish(message("ping.result.b", "other")), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_publish_to_full_buffer_drops_without_blocking() {
    let mut broker = Broker::default();
    let (tx, mut rx) = mpsc::channel::<Message>(2);
    let client = Client::new(tx);
    broker.subscribe("t", client.id.clone());
    broker.register_client(client);

    assert_eq!(broker.publish(message("t", "1")), 1);
    assert_eq!(broker.publish(message("t", "2")), 1);
    assert_eq!(broker.publish(message("t", "3")), 0);

    assert_eq!(rx.try_recv().unwrap().payload, "1");
    assert_eq!(rx.try_recv().unwrap().payload, "2");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_publish_to_nonexistent_topic() {
    let broker = Broker::default();
    assert_eq!(broker.publish(message("nonexistent_topic", "hello")), 0);
}

#[test]
fn test_publish_to_client_with_closed_channel() {
    let mut broker = Broker::default();
    let (tx, rx) = mpsc::channel::<Message>(4);
    let client = Client::new(tx);
    broker.subscribe("test_topic", client.id.clone());
    broker.register_client(client);

    drop(rx);

    assert_eq!(broker.publish(message("test_topic", "hello")), 0);
}

#[test]
fn test_broker_cleanup_client() {
    let mut broker = Broker::default();
    let (tx, _) = mpsc::channel::<Message>(4);
    let client = Client::new(tx);
    let client_id = client.id.clone();
    let (other_tx, _) = mpsc::channel::<Message>(4);
    let other = Client::new(other_tx);
    let other_id = other.id.clone();
    broker.register_client(client);
    broker.register_client(other);
    broker.subscribe("only_mine", client_id.clone());
    broker.subscribe("shared", client_id.clone());
    broker.subscribe("shared", other_id.clone());

    broker.cleanup_client(&client_id);

    assert!(!broker.clients.contains_key(&client_id));
    assert!(!broker.topics.contains_key("only_mine"));
    assert_eq!(broker.subscriber_count("shared"), 1);
    assert!(broker.topics["shared"].subscribers.contains(&other_id));
}

#[tokio::test]
async fn test_disconnect_all_ends_receivers() {
    let mut broker = Broker::default();
    let (tx, mut rx) = mpsc::channel::<Message>(4);
    let client = Client::new(tx);
    broker.subscribe("t", client.id.clone());
    broker.register_client(client);

    broker.disconnect_all();

    assert!(rx.recv().await.is_none());
    assert!(broker.topics.is_empty());
}
