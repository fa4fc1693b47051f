//! SOAP envelope wrap/unwrap (§4.11 "Envelope contract"): writing is done
//! with `quick-xml`'s `Writer`, reading with `roxmltree` — the same
//! read/write split `imposter-core` keeps between `response_builder` (write)
//! and `matcher`/`xpath` (read).

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::Document;

use crate::error::{Error, Result};
use crate::wsdl::SoapVersion;

/// Wrap `body_xml` (already-serialized child content) in a SOAP envelope of
/// the given version.
pub fn wrap(version: SoapVersion, body_xml: &str) -> String {
    let mut writer = Writer::new(Vec::new());
    let ns = version.envelope_namespace();

    let mut envelope = BytesStart::new("soap:Envelope");
    envelope.push_attribute(("xmlns:soap", ns));
    writer.write_event(Event::Start(envelope)).expect("in-memory writer never fails");
    writer.write_event(Event::Start(BytesStart::new("soap:Body"))).expect("in-memory writer never fails");
    writer.write_event(Event::Text(BytesText::from_escaped(body_xml))).expect("in-memory writer never fails");
    writer.write_event(Event::End(BytesEnd::new("soap:Body"))).expect("in-memory writer never fails");
    writer.write_event(Event::End(BytesEnd::new("soap:Envelope"))).expect("in-memory writer never fails");

    String::from_utf8(writer.into_inner()).expect("writer only ever receives valid UTF-8 input")
}

/// Build a SOAP Fault envelope (§4.11: invalid envelope or missing Body is a
/// 400 client fault; `soapFault: true` or a 500 status is a server fault).
pub fn fault(version: SoapVersion, code: &str, message: &str) -> String {
    let body = match version {
        SoapVersion::V11 => format!(
            "<soap:Fault><faultcode>{code}</faultcode><faultstring>{message}</faultstring></soap:Fault>",
        ),
        SoapVersion::V12 => format!(
            "<soap:Fault><soap:Code><soap:Value>{code}</soap:Value></soap:Code><soap:Reason><soap:Text>{message}</soap:Text></soap:Reason></soap:Fault>",
        ),
    };
    wrap(version, &body)
}

/// The outcome of inspecting an inbound request body as a SOAP envelope.
pub struct ParsedEnvelope {
    /// Local name of the first child element of `Body`, i.e. the operation.
    pub operation_name: Option<String>,
}

/// Parse `body` as a SOAP envelope of either version. Returns `Err` if the
/// document doesn't parse as XML, has no root `Envelope`, or has no `Body`
/// child (§4.11: these are a 400, not a silent non-match).
pub fn unwrap(body: &[u8]) -> Result<ParsedEnvelope> {
    let text = std::str::from_utf8(body).map_err(|e| Error::Wsdl(e.to_string()))?;
    let doc = Document::parse(text)?;
    let root = doc.root_element();

    let is_envelope = root.tag_name().name() == "Envelope"
        && matches!(
            root.tag_name().namespace(),
            Some(ns) if ns == SoapVersion::V11.envelope_namespace() || ns == SoapVersion::V12.envelope_namespace()
        );
    if !is_envelope {
        return Err(Error::Wsdl("root element is not a SOAP Envelope".to_string()));
    }

    let envelope_ns = root.tag_name().namespace().unwrap_or_default();
    let body_node = root
        .children()
        .find(|n| n.tag_name().name() == "Body" && n.tag_name().namespace() == Some(envelope_ns))
        .ok_or_else(|| Error::Wsdl("Envelope has no Body".to_string()))?;

    let operation_name = body_node.children().find(|n| n.is_element()).map(|n| n.tag_name().name().to_string());

    Ok(ParsedEnvelope { operation_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_body_in_soap11_envelope() {
        let xml = wrap(SoapVersion::V11, "<GetPetResponse>ok</GetPetResponse>");
        assert!(xml.contains("http://schemas.xmlsoap.org/soap/envelope/"));
        assert!(xml.contains("<GetPetResponse>ok</GetPetResponse>"));
    }

    #[test]
    fn wraps_body_in_soap12_envelope() {
        let xml = wrap(SoapVersion::V12, "<Ping/>");
        assert!(xml.contains("http://www.w3.org/2003/05/soap-envelope"));
    }

    #[test]
    fn unwraps_operation_name_from_body() {
        let envelope = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
            <soap:Body><GetPet><id>1</id></GetPet></soap:Body>
        </soap:Envelope>"#;
        let parsed = unwrap(envelope.as_bytes()).unwrap();
        assert_eq!(parsed.operation_name.as_deref(), Some("GetPet"));
    }

    #[test]
    fn missing_body_is_rejected() {
        let envelope = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"/>"#;
        assert!(unwrap(envelope.as_bytes()).is_err());
    }

    #[test]
    fn non_envelope_root_is_rejected() {
        assert!(unwrap(b"<nope/>").is_err());
    }

    #[test]
    fn fault_envelope_carries_faultstring() {
        let xml = fault(SoapVersion::V11, "soap:Server", "boom");
        assert!(xml.contains("<faultstring>boom</faultstring>"));
    }
}
