//! Wire-level enumerations: RR types, classes, response codes, EDNS option codes.

/// DNS resource record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    DNAME,
    OPT,
    ANY,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(v: u16) -> Self {
        match v {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            39 => RecordType::DNAME,
            41 => RecordType::OPT,
            255 => RecordType::ANY,
            other => RecordType::Unknown(other),
        }
    }
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::DNAME => 39,
            RecordType::OPT => 41,
            RecordType::ANY => 255,
            RecordType::Unknown(v) => v,
        }
    }

    pub fn name(&self) -> String {
        match self {
            RecordType::A => "A".into(),
            RecordType::NS => "NS".into(),
            RecordType::CNAME => "CNAME".into(),
            RecordType::SOA => "SOA".into(),
            RecordType::PTR => "PTR".into(),
            RecordType::MX => "MX".into(),
            RecordType::TXT => "TXT".into(),
            RecordType::AAAA => "AAAA".into(),
            RecordType::SRV => "SRV".into(),
            RecordType::DNAME => "DNAME".into(),
            RecordType::OPT => "OPT".into(),
            RecordType::ANY => "ANY".into(),
            RecordType::Unknown(v) => format!("TYPE{}", v),
        }
    }
}

/// DNS response code (the 4-bit RCODE plus the EDNS extended-rcode high bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError,
    FormErr,
    ServFail,
    NxDomain,
    NotImp,
    Refused,
    YxDomain,
    YxrrSet,
    NxrrSet,
    NotAuth,
    NotZone,
    Unknown(u16),
}

impl From<u16> for ResponseCode {
    fn from(v: u16) -> Self {
        match v {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormErr,
            2 => ResponseCode::ServFail,
            3 => ResponseCode::NxDomain,
            4 => ResponseCode::NotImp,
            5 => ResponseCode::Refused,
            6 => ResponseCode::YxDomain,
            7 => ResponseCode::YxrrSet,
            8 => ResponseCode::NxrrSet,
            9 => ResponseCode::NotAuth,
            10 => ResponseCode::NotZone,
            other => ResponseCode::Unknown(other),
        }
    }
}

impl ResponseCode {
    /// Short text rendering used by the normalized record's `dns.rcode` field.
    pub fn short_text(&self) -> String {
        match self {
            ResponseCode::NoError => "NOERROR".into(),
            ResponseCode::FormErr => "FORMERR".into(),
            ResponseCode::ServFail => "SERVFAIL".into(),
            ResponseCode::NxDomain => "NXDOMAIN".into(),
            ResponseCode::NotImp => "NOTIMP".into(),
            ResponseCode::Refused => "REFUSED".into(),
            ResponseCode::YxDomain => "YXDOMAIN".into(),
            ResponseCode::YxrrSet => "YXRRSET".into(),
            ResponseCode::NxrrSet => "NXRRSET".into(),
            ResponseCode::NotAuth => "NOTAUTH".into(),
            ResponseCode::NotZone => "NOTZONE".into(),
            ResponseCode::Unknown(v) => format!("RCODE{}", v),
        }
    }
}

/// DNS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsClass {
    IN,
    CH,
    HS,
    Unknown(u16),
}

impl From<u16> for DnsClass {
    fn from(v: u16) -> Self {
        match v {
            1 => DnsClass::IN,
            3 => DnsClass::CH,
            4 => DnsClass::HS,
            other => DnsClass::Unknown(other),
        }
    }
}

/// Known EDNS option codes (RFC 6891 + common extensions). Unknown codes are
/// preserved using their hex form as `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdnsOptionCode {
    Nsid,
    Ecs,
    Cookie,
    Keepalive,
    Padding,
    Ede,
    Unknown(u16),
}

impl From<u16> for EdnsOptionCode {
    fn from(v: u16) -> Self {
        match v {
            3 => EdnsOptionCode::Nsid,
            8 => EdnsOptionCode::Ecs,
            10 => EdnsOptionCode::Cookie,
            11 => EdnsOptionCode::Keepalive,
            12 => EdnsOptionCode::Padding,
            15 => EdnsOptionCode::Ede,
            other => EdnsOptionCode::Unknown(other),
        }
    }
}

impl EdnsOptionCode {
    pub fn name(&self) -> String {
        match self {
            EdnsOptionCode::Nsid => "NSID".into(),
            EdnsOptionCode::Ecs => "ECS".into(),
            EdnsOptionCode::Cookie => "COOKIE".into(),
            EdnsOptionCode::Keepalive => "KEEPALIVE".into(),
            EdnsOptionCode::Padding => "PADDING".into(),
            EdnsOptionCode::Ede => "EDE".into(),
            EdnsOptionCode::Unknown(v) => format!("{:#06X}", v),
        }
    }
}
