//! Pipeline orchestrator. Owns the ingress channel and the correlation
//! cache, and runs the fixed per-envelope sequence: decode envelope,
//! decode DNS payload, correlate, enrich, dispatch.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::correlate::{fingerprint, CorrelationCache};
use crate::enrich::{anonymize_ip, apply_quiet_text, minimize_qname, should_drop, FilterRules, GeoipDatabase};
use crate::envelope::{decode_envelope, Envelope, TapOperation};
use crate::metrics::PipelineMetrics;
use crate::record::{self, DnsFlags, GeoInfo, NormalizedRecord, TimeInfo};
use crate::sink::Sink;
use crate::wire::{decode_edns, decode_header, decode_question, decode_records};

/// One worker per processor; the cache is exclusive to it, never shared
/// across workers.
pub struct DnstapProcessor {
    config: Config,
    cache: Arc<CorrelationCache>,
    filter: FilterRules,
    geoip: Arc<dyn GeoipDatabase>,
    sinks: Vec<Arc<dyn Sink>>,
    metrics: Arc<PipelineMetrics>,
}

impl DnstapProcessor {
    pub fn new(
        config: Config,
        geoip: Arc<dyn GeoipDatabase>,
        sinks: Vec<Arc<dyn Sink>>,
        metrics: Arc<PipelineMetrics>,
    ) -> anyhow::Result<Self> {
        let filter = FilterRules::new(&config.filtering)?;
        let cache = Arc::new(CorrelationCache::new(&config.cache));
        Ok(Self { config, cache, filter, geoip, sinks, metrics })
    }

    pub fn cache(&self) -> Arc<CorrelationCache> {
        Arc::clone(&self.cache)
    }

    /// Run until `ingress` closes, then drain what's left, sweep the
    /// cache one last time, and return. Callers that want an orderly
    /// shutdown should close their sender and await this future.
    pub async fn run(&self, mut ingress: mpsc::Receiver<Vec<u8>>) {
        info!("pipeline worker starting");
        while let Some(frame) = ingress.recv().await {
            self.process_frame(&frame).await;
        }
        self.cache.expire(Instant::now());
        info!("pipeline worker drained, exiting");
    }

    async fn process_frame(&self, frame: &[u8]) {
        self.metrics.record_ingested();

        let envelope = match decode_envelope(frame) {
            Ok(env) => env,
            Err(e) => {
                debug!(error = %e, "dropping envelope that failed to decode");
                self.metrics.record_envelope_dropped();
                return;
            }
        };

        let Some((mut record, operation)) = self.build_record(envelope) else {
            self.metrics.record_envelope_dropped();
            return;
        };
        if record.dns.malformed_packet == 1 {
            self.metrics.record_malformed();
        }

        self.normalize_qname(&mut record);

        if should_drop(&self.filter, &record) {
            self.metrics.record_filtered();
            return;
        }

        self.apply_enrichers(&mut record, operation);

        self.dispatch(record).await;
    }

    /// Direction-dependent field selection, plus the DNS payload decode and
    /// correlation steps. Returns `None` only when the envelope had no
    /// usable message at all (no operation, or neither payload present) —
    /// otherwise always returns a record, malformed or not.
    fn build_record(&self, envelope: Envelope) -> Option<(NormalizedRecord, TapOperation)> {
        let message = envelope.message?;
        let operation = message.operation?;
        let is_query = operation.is_query();

        let mut record = NormalizedRecord::default();
        record.identity = envelope.identity.unwrap_or_default();
        record.dns.operation = operation.name().to_string();
        record.dns.direction = if is_query { "query".to_string() } else { "reply".to_string() };

        record.network.family = message.socket_family.map(|f| f.name().to_string());
        record.network.protocol = message.socket_protocol.map(|p| p.name().to_string());
        if let Some(ip) = message.query.ip {
            record.network.query_ip = Some(ip.to_string());
        }
        if let Some(port) = message.query.port {
            if port != 0 {
                record.network.query_port = Some(port);
            }
        }
        if let Some(ip) = message.response.ip {
            record.network.response_ip = Some(ip.to_string());
        }
        if let Some(port) = message.response.port {
            if port != 0 {
                record.network.response_port = Some(port);
            }
        }

        let (payload, sec, nsec) = if is_query {
            (message.query_message, message.query_time_sec, message.query_time_nsec)
        } else {
            (message.response_message, message.response_time_sec, message.response_time_nsec)
        };
        let payload = payload.unwrap_or_default();
        record.dns.length = payload.len();
        record.time = TimeInfo::from_parts(sec.unwrap_or(0), nsec.unwrap_or(0));

        self.decode_dns_payload(&payload, &mut record);
        record.dns.payload = payload;

        self.correlate(is_query, &mut record);

        Some((record, operation))
    }

    /// Header → question → answers → authority → additional → EDNS,
    /// stopping the DNS-dependent chain (not the whole record) at the
    /// first failure.
    fn decode_dns_payload(&self, payload: &[u8], record: &mut NormalizedRecord) {
        let header = match decode_header(payload) {
            Ok(h) => h,
            Err(e) => {
                debug!(error = %e, "header decode failed");
                record.dns.malformed_packet = 1;
                return;
            }
        };
        record.dns.id = header.id;
        record.dns.rcode = header.rcode.short_text();
        record.dns.flags = DnsFlags {
            qr: header.qr,
            tc: header.tc,
            aa: header.aa,
            ra: header.ra,
            ad: header.ad,
        };

        let mut offset = 12;
        if header.qdcount > 0 {
            match decode_question(payload) {
                Ok((question, next)) => {
                    record.dns.qname = question.qname;
                    record.dns.qtype = question.qtype.name();
                    offset = next;
                }
                Err(e) => {
                    debug!(error = %e, "question decode failed");
                    record.dns.malformed_packet = 1;
                    return;
                }
            }
        }

        if header.ancount > 0 {
            match decode_records(payload, &mut offset, header.ancount) {
                Ok(rrs) => record.dns.rrs.answers = record::record_views(&rrs),
                Err(e) => {
                    debug!(error = %e, "answer section decode failed");
                    record.dns.malformed_packet = 1;
                    return;
                }
            }
        }

        if header.nscount > 0 {
            match decode_records(payload, &mut offset, header.nscount) {
                Ok(rrs) => record.dns.rrs.nameservers = record::record_views(&rrs),
                Err(e) => {
                    debug!(error = %e, "authority section decode failed");
                    record.dns.malformed_packet = 1;
                    return;
                }
            }
        }

        if header.arcount > 0 {
            match decode_records(payload, &mut offset, header.arcount) {
                Ok(rrs) => {
                    record.dns.rrs.extended = decode_edns(&rrs).map(|ext| (&ext).into());
                    record.dns.rrs.records = record::record_views(&rrs);
                }
                Err(e) => {
                    debug!(error = %e, "additional section decode failed");
                    record.dns.malformed_packet = 1;
                }
            }
        }
    }

    /// On a query, remember its timestamp; on a reply, consume the
    /// matching query's timestamp and derive latency, clamping any
    /// negative delta (fingerprint collision) to zero. `latency`/
    /// `latency_str` are a paired rendering of the same value (spec.md
    /// §3), so `latency_str` is set unconditionally here — 0.0 renders
    /// as "0.000000", not an empty string, whether or not a cache hit
    /// ever occurs.
    fn correlate(&self, is_query: bool, record: &mut NormalizedRecord) {
        if self.config.cache.enable {
            if let Some(ip) = record.network.query_ip.as_deref().and_then(|s| s.parse::<IpAddr>().ok()) {
                if let Some(port) = record.network.query_port {
                    let key = fingerprint(ip, port, record.dns.id);
                    if is_query {
                        self.cache.set(key, record.time.ts_float);
                    } else if let Some(query_ts) = self.cache.get(key) {
                        record.dns.latency = (record.time.ts_float - query_ts).max(0.0);
                    }
                }
            }
        }
        record.dns.latency_str = record::format_latency(record.dns.latency);
    }

    /// Qname lowercasing and minimization happen before the filter
    /// (handled by the caller) so the filter sees the qname it would
    /// actually match on.
    fn normalize_qname(&self, record: &mut NormalizedRecord) {
        if self.config.qname_lowercase {
            record.dns.qname = record.dns.qname.to_ascii_lowercase();
        }
        if self.config.user_privacy.minimize_qname {
            record.dns.qname = minimize_qname(&record.dns.qname, self.config.user_privacy.minimize_depth);
        }
    }

    /// Geo runs before IP anonymization (so geo sees the real IP), then
    /// short-text substitution last.
    fn apply_enrichers(&self, record: &mut NormalizedRecord, operation: TapOperation) {
        if let Some(ip) = record.network.query_ip.clone() {
            let geo = self.geoip.lookup(&ip);
            record.geo = GeoInfo { continent: geo.continent, country_iso: geo.country_iso, city: geo.city };
            record.network.asn = geo.asn;
            record.network.aso = geo.aso;
        }

        if self.config.user_privacy.anonymize_ip {
            if let Some(ip) = record.network.query_ip.take() {
                record.network.query_ip = Some(anonymize_ip(&ip));
            }
            if let Some(ip) = record.network.response_ip.take() {
                record.network.response_ip = Some(anonymize_ip(&ip));
            }
        }

        apply_quiet_text(record, &self.config.quiet_text, Some(operation));
    }

    /// Send to each registered sink in declared order. A full sink blocks
    /// this call — mandatory backpressure propagating back to the
    /// ingress queue.
    async fn dispatch(&self, record: NormalizedRecord) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(record.clone()).await {
                warn!(sink = sink.label(), error = %e, "sink send failed");
            } else {
                self.metrics.record_dispatched(sink.label());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, FilteringConfig, IngressConfig, MetricsConfig, QuietTextConfig, SinkConfig, UserPrivacyConfig};
    use crate::enrich::NullGeoipDatabase;
    use crate::envelope::encode::{encode_envelope, MessageBuilder};
    use crate::envelope::SocketFamily;
    use crate::envelope::SocketProtocol;
    use crate::sink::TextSink;
    use std::net::Ipv4Addr;
    use std::sync::Mutex as StdMutex;

    fn test_config() -> Config {
        Config {
            ingress: IngressConfig { unix_socket_path: "/tmp/x".into(), capacity: 512 },
            cache: CacheConfig { enable: true, query_timeout: 10 },
            qname_lowercase: false,
            quiet_text: QuietTextConfig::default(),
            filtering: FilteringConfig::default(),
            geoip: Default::default(),
            user_privacy: UserPrivacyConfig { anonymize_ip: false, minimize_qname: false, minimize_depth: 2 },
            sinks: vec![SinkConfig::Text { path: "/dev/null".into(), capacity: 256 }],
            metrics: MetricsConfig::default(),
        }
    }

    struct CollectingSink {
        records: StdMutex<Vec<NormalizedRecord>>,
    }

    #[async_trait::async_trait]
    impl Sink for CollectingSink {
        async fn send(&self, record: NormalizedRecord) -> anyhow::Result<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
        fn label(&self) -> &str {
            "collecting"
        }
    }

    fn dns_query_packet(id: u16, qname: &str) -> Vec<u8> {
        let mut packet = vec![0u8; 12];
        packet[0] = (id >> 8) as u8;
        packet[1] = (id & 0xFF) as u8;
        packet[4] = 0;
        packet[5] = 1; // qdcount = 1
        packet.extend_from_slice(&crate::wire::name::encode_name(qname));
        packet.extend_from_slice(&1u16.to_be_bytes()); // A
        packet.extend_from_slice(&1u16.to_be_bytes()); // IN
        packet
    }

    /// A response carrying the same question plus one A-record answer,
    /// `qr=1`/`rd=1`/`ra=1`, rcode NOERROR.
    fn dns_response_packet(id: u16, qname: &str, answer_ip: [u8; 4], ttl: u32) -> Vec<u8> {
        let mut packet = vec![0u8; 12];
        packet[0] = (id >> 8) as u8;
        packet[1] = (id & 0xFF) as u8;
        packet[2] = 0x81;
        packet[3] = 0x80;
        packet[5] = 1; // qdcount = 1
        packet[7] = 1; // ancount = 1
        packet.extend_from_slice(&crate::wire::name::encode_name(qname));
        packet.extend_from_slice(&1u16.to_be_bytes()); // qtype A
        packet.extend_from_slice(&1u16.to_be_bytes()); // qclass IN
        packet.extend_from_slice(&crate::wire::name::encode_name(qname));
        packet.extend_from_slice(&1u16.to_be_bytes()); // type A
        packet.extend_from_slice(&1u16.to_be_bytes()); // class IN
        packet.extend_from_slice(&ttl.to_be_bytes());
        packet.extend_from_slice(&4u16.to_be_bytes()); // rdlength
        packet.extend_from_slice(&answer_ip);
        packet
    }

    async fn processor_with(sink: Arc<CollectingSink>) -> DnstapProcessor {
        DnstapProcessor::new(
            test_config(),
            Arc::new(NullGeoipDatabase),
            vec![sink],
            Arc::new(PipelineMetrics::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn happy_query_produces_expected_record() {
        let sink = Arc::new(CollectingSink { records: StdMutex::new(Vec::new()) });
        let processor = processor_with(Arc::clone(&sink)).await;

        let msg = MessageBuilder {
            operation: Some(TapOperation::ClientQuery),
            socket_family: Some(SocketFamily::Inet),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(54321),
            response_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            response_port: Some(53),
            query_time: Some((1_700_000_000, 0)),
            query_message: Some(dns_query_packet(0x1234, "example.com")),
            ..Default::default()
        };
        let frame = encode_envelope("test", &msg);
        processor.process_frame(&frame).await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.dns.operation, "CLIENT_QUERY");
        assert_eq!(r.dns.direction, "query");
        assert_eq!(r.dns.id, 0x1234);
        assert_eq!(r.dns.qname, "example.com");
        assert_eq!(r.dns.qtype, "A");
        assert_eq!(r.dns.malformed_packet, 0);
        assert_eq!(r.dns.latency, 0.0);
    }

    #[tokio::test]
    async fn malformed_question_is_flagged_but_still_dispatched() {
        let sink = Arc::new(CollectingSink { records: StdMutex::new(Vec::new()) });
        let processor = processor_with(Arc::clone(&sink)).await;

        let mut packet = vec![0u8; 12];
        packet[5] = 1; // qdcount = 1
        packet.push(200); // label length byte overruns the buffer
        let msg = MessageBuilder {
            operation: Some(TapOperation::ClientQuery),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(54321),
            query_time: Some((1_700_000_000, 0)),
            query_message: Some(packet),
            ..Default::default()
        };
        let frame = encode_envelope("test", &msg);
        processor.process_frame(&frame).await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dns.malformed_packet, 1);
        assert_eq!(records[0].dns.qname, "");
    }

    /// Spec §8 scenario 2: a query followed by its matching response
    /// (same query ip/port/dns id) carries a derived latency.
    #[tokio::test]
    async fn matching_response_derives_latency_and_answer() {
        let sink = Arc::new(CollectingSink { records: StdMutex::new(Vec::new()) });
        let processor = processor_with(Arc::clone(&sink)).await;

        let query = MessageBuilder {
            operation: Some(TapOperation::ClientQuery),
            socket_family: Some(SocketFamily::Inet),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(54321),
            response_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            response_port: Some(53),
            query_time: Some((1_700_000_000, 0)),
            query_message: Some(dns_query_packet(0x1234, "example.com")),
            ..Default::default()
        };
        processor.process_frame(&encode_envelope("test", &query)).await;

        // Responses are keyed by the client (query-side) tuple, not the
        // resolver's, so `query_ip`/`query_port` carry the same client
        // endpoint as the preceding query.
        let response = MessageBuilder {
            operation: Some(TapOperation::ClientResponse),
            socket_family: Some(SocketFamily::Inet),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(54321),
            response_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            response_port: Some(53),
            response_time: Some((1_700_000_000, 25_000_000)),
            response_message: Some(dns_response_packet(0x1234, "example.com", [93, 184, 216, 34], 300)),
            ..Default::default()
        };
        processor.process_frame(&encode_envelope("test", &response)).await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        let reply = &records[1];
        assert_eq!(reply.dns.direction, "reply");
        assert_eq!(reply.dns.rcode, "NOERROR");
        assert!((reply.dns.latency - 0.025).abs() < 1e-6);
        assert_eq!(reply.dns.latency_str, "0.025000");
        assert_eq!(reply.dns.rrs.answers.len(), 1);
        assert_eq!(reply.dns.rrs.answers[0].rtype, "A");
        assert_eq!(reply.dns.rrs.answers[0].rdata, "93.184.216.34");
    }

    /// Spec §8 boundary case: port 0 is a zero-valued field and must be
    /// omitted from the DM, not rendered as the literal port number 0.
    #[tokio::test]
    async fn zero_port_is_omitted_not_rendered() {
        let sink = Arc::new(CollectingSink { records: StdMutex::new(Vec::new()) });
        let processor = processor_with(Arc::clone(&sink)).await;

        let msg = MessageBuilder {
            operation: Some(TapOperation::ClientQuery),
            socket_family: Some(SocketFamily::Inet),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(0),
            query_time: Some((1_700_000_000, 0)),
            query_message: Some(dns_query_packet(0x1234, "example.com")),
            ..Default::default()
        };
        processor.process_frame(&encode_envelope("test", &msg)).await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].network.query_port, None);
    }

    /// Spec §8 boundary case: IPv6 query/response endpoints flow through
    /// the pipeline and correlate just like IPv4 ones.
    #[tokio::test]
    async fn ipv6_query_endpoints_correlate_and_dispatch() {
        let sink = Arc::new(CollectingSink { records: StdMutex::new(Vec::new()) });
        let processor = processor_with(Arc::clone(&sink)).await;

        let client_ip = "2001:db8::1".parse::<IpAddr>().unwrap();
        let resolver_ip = "2001:db8::2".parse::<IpAddr>().unwrap();

        let query = MessageBuilder {
            operation: Some(TapOperation::ClientQuery),
            socket_family: Some(SocketFamily::Inet6),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(client_ip),
            query_port: Some(54321),
            response_ip: Some(resolver_ip),
            response_port: Some(53),
            query_time: Some((1_700_000_000, 0)),
            query_message: Some(dns_query_packet(0x1234, "example.com")),
            ..Default::default()
        };
        processor.process_frame(&encode_envelope("test", &query)).await;

        let response = MessageBuilder {
            operation: Some(TapOperation::ClientResponse),
            socket_family: Some(SocketFamily::Inet6),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(client_ip),
            query_port: Some(54321),
            response_ip: Some(resolver_ip),
            response_port: Some(53),
            response_time: Some((1_700_000_000, 10_000_000)),
            response_message: Some(dns_response_packet(0x1234, "example.com", [93, 184, 216, 34], 300)),
            ..Default::default()
        };
        processor.process_frame(&encode_envelope("test", &response)).await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].network.family.as_deref(), Some("INET6"));
        assert_eq!(records[0].network.query_ip.as_deref(), Some("2001:db8::1"));
        let reply = &records[1];
        assert!((reply.dns.latency - 0.01).abs() < 1e-6);
    }

    /// Spec §8 boundary case: a response with no response-side timestamp
    /// still populates `time` from the (absent, defaulted-to-zero)
    /// response side only — a non-zero query timestamp on the same
    /// message must not leak into `time`.
    #[tokio::test]
    async fn missing_response_timestamp_does_not_fall_back_to_query_timestamp() {
        let sink = Arc::new(CollectingSink { records: StdMutex::new(Vec::new()) });
        let processor = processor_with(Arc::clone(&sink)).await;

        let msg = MessageBuilder {
            operation: Some(TapOperation::ClientResponse),
            socket_family: Some(SocketFamily::Inet),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(54321),
            response_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            response_port: Some(53),
            query_time: Some((1_700_000_000, 0)),
            response_message: Some(dns_response_packet(0x1234, "example.com", [93, 184, 216, 34], 300)),
            ..Default::default()
        };
        processor.process_frame(&encode_envelope("test", &msg)).await;

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time.sec, 0);
        assert_eq!(records[0].time.nsec, 0);
        assert_eq!(records[0].dns.latency_str, "0.000000");
    }
}
