//! End to end tests running a real server and client over loopback UDP

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tinyns::dns::authority::Authority;
use tinyns::dns::client::{ClientError, DnsNetworkClient};
use tinyns::dns::context::ServerContext;
use tinyns::dns::protocol::{DnsRecord, QueryType};
use tinyns::dns::resolve::resolve;
use tinyns::dns::server::{DnsServer, DnsUdpServer};

const MASTER: &str = "\
# root
.                 NS     ns.root
ns.root           A      198.41.0.4

# example.com
example.com       NS     ns1.example.com
ns1.example.com   A      10.0.0.53
example.com       A      10.0.0.1
example.com       A      10.0.0.2
www.example.com   CNAME  example.com
ftp.example.com   CNAME  www.example.com
";

fn start_server() -> (Arc<ServerContext>, SocketAddr) {
    let mut authority = Authority::new();
    authority.load(MASTER.as_bytes()).unwrap();

    let mut context = ServerContext::new(authority);
    context.listen_host = "127.0.0.1".to_string();
    context.dns_port = 0;
    let context = Arc::new(context);

    let server = DnsUdpServer::bind(context.clone()).unwrap();
    let addr = server.local_addr().unwrap();
    server.run_server().unwrap();

    (context, addr)
}

fn client() -> DnsNetworkClient {
    DnsNetworkClient::new(Duration::from_secs(5)).unwrap()
}

#[test]
fn test_exact_match() {
    let (_, addr) = start_server();

    let res = client().send_query("example.com", QueryType::A, addr).unwrap();

    assert_eq!("example.com", res.question.name);
    assert_eq!(QueryType::A, res.question.qtype);
    assert_eq!(
        vec![
            DnsRecord::new("example.com", QueryType::A, "10.0.0.1"),
            DnsRecord::new("example.com", QueryType::A, "10.0.0.2"),
        ],
        res.answers
    );
    assert!(res.authorities.is_empty());
}

#[test]
fn test_alias_chase() {
    let (_, addr) = start_server();

    let res = client().send_query("ftp.example.com", QueryType::A, addr).unwrap();

    assert_eq!(4, res.answers.len());
    assert_eq!(
        DnsRecord::new("ftp.example.com", QueryType::Cname, "www.example.com"),
        res.answers[0]
    );
    assert_eq!(
        DnsRecord::new("www.example.com", QueryType::Cname, "example.com"),
        res.answers[1]
    );
    assert_eq!("10.0.0.1", res.answers[2].get_value());

    // asking for the alias itself stops at the first hop
    let res = client().send_query("ftp.example.com", QueryType::Cname, addr).unwrap();
    assert_eq!(1, res.answers.len());
}

#[test]
fn test_nameserver_with_glue() {
    let (_, addr) = start_server();

    let res = client().send_query("example.com", QueryType::Ns, addr).unwrap();

    assert!(res.answers.is_empty());
    assert_eq!(
        vec![DnsRecord::new("example.com", QueryType::Ns, "ns1.example.com")],
        res.authorities
    );
    assert_eq!(
        vec![DnsRecord::new("ns1.example.com", QueryType::A, "10.0.0.53")],
        res.resources
    );
}

#[test]
fn test_referrals() {
    let (_, addr) = start_server();

    // closest delegation is the parent zone
    let res = client().send_query("mail.example.com", QueryType::A, addr).unwrap();
    assert!(res.answers.is_empty());
    assert_eq!("example.com", res.authorities[0].get_domain());
    assert_eq!("ns1.example.com", res.resources[0].get_domain());

    // nothing closer than the root
    let res = client().send_query("yahoo.com", QueryType::A, addr).unwrap();
    assert!(res.answers.is_empty());
    assert_eq!(
        vec![DnsRecord::new(".", QueryType::Ns, "ns.root")],
        res.authorities
    );
    assert_eq!(
        vec![DnsRecord::new("ns.root", QueryType::A, "198.41.0.4")],
        res.resources
    );
}

#[test]
fn test_concurrent_queries_match_direct_resolution() {
    let (context, addr) = start_server();

    let queries = vec![
        ("example.com", QueryType::A),
        ("www.example.com", QueryType::A),
        ("ftp.example.com", QueryType::Cname),
        ("example.com", QueryType::Ns),
        ("a.b.example.com", QueryType::A),
        ("nowhere.org", QueryType::Ns),
    ];

    let handles: Vec<_> = (0..4)
        .flat_map(|_| queries.clone())
        .map(|(qname, qtype)| {
            let context = context.clone();
            thread::spawn(move || {
                let res = client().send_query(qname, qtype, addr).unwrap();
                let expected = resolve(qtype, qname, &context.authority).unwrap();

                assert_eq!(qname, res.question.name);
                assert_eq!(expected.answers, res.answers);
                assert_eq!(expected.authorities, res.authorities);
                assert_eq!(expected.resources, res.resources);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(24, context.statistics.get_udp_query_count());
}

#[test]
fn test_server_survives_garbage() {
    let (context, addr) = start_server();

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.send_to(&[], addr).unwrap();
    socket.send_to(&[0xff; 64], addr).unwrap();

    let res = client().send_query("example.com", QueryType::A, addr).unwrap();
    assert_eq!(2, res.answers.len());
    assert_eq!(2, context.statistics.get_malformed_count());
}

#[test]
fn test_client_times_out_without_server() {
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap();

    let client = DnsNetworkClient::new(Duration::from_millis(100)).unwrap();
    assert!(matches!(
        client.send_query("example.com", QueryType::A, addr),
        Err(ClientError::TimeOut)
    ));
}
