//! WSDL 1.1 / 2.0 parsing (§4.11): discovers operations, their input/output/
//! fault messages, the binding each resolves to, and an index of the XSD
//! schemas embedded under `wsdl:types`.
//!
//! Read-only XML walking over `roxmltree` is grounded on `matcher::score`'s
//! own use of `roxmltree::Document` for body projection — the same "parse
//! once, walk with plain tree navigation" idiom, just applied to a WSDL
//! document instead of a request body.

use std::path::PathBuf;

use roxmltree::{Document, Node};

use crate::error::{Error, Result};

const WSDL1_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
const WSDL2_NS: &str = "http://www.w3.org/ns/wsdl";
const SOAP11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
const SOAP12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    V11,
    V12,
}

impl SoapVersion {
    pub fn envelope_namespace(self) -> &'static str {
        match self {
            Self::V11 => "http://schemas.xmlsoap.org/soap/envelope/",
            Self::V12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::V11 => "text/xml",
            Self::V12 => "application/soap+xml",
        }
    }
}

/// A namespace-qualified name, resolved to its full URI where known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

/// The shape of one operation's input/output/fault (§4.11 "Parser output").
#[derive(Debug, Clone)]
pub enum Message {
    Element { qname: QName },
    Type { part_name: String, type_qname: QName },
    Composite { name: String, parts: Vec<(String, QName)> },
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub soap_action: String,
    pub input: Message,
    pub output: Message,
    pub fault: Option<Message>,
    pub binding_name: String,
}

/// Every `<xs:schema>` found under `wsdl:types` (or transitively imported),
/// each written out to its own temp file (§4.11 "Schema index": "write each
/// to a temp file and record (target-namespace, path)"). Kept for the
/// process lifetime via `tempfile::Builder::keep` (§5 resource model).
pub struct SchemaIndex {
    schemas: Vec<(Option<String>, PathBuf)>,
}

impl SchemaIndex {
    /// Linear scan for a schema declaring `target_namespace` (§4.11: "does a
    /// linear scan until it finds a matching name").
    pub fn schema_for_namespace(&self, target_namespace: Option<&str>) -> Option<&PathBuf> {
        self.schemas.iter().find(|(ns, _)| ns.as_deref() == target_namespace).map(|(_, path)| path)
    }

    pub fn all(&self) -> &[(Option<String>, PathBuf)] {
        &self.schemas
    }
}

pub struct WsdlDocument {
    pub operations: Vec<Operation>,
    pub schema_index: SchemaIndex,
    pub soap_version: SoapVersion,
}

/// Parse a WSDL document's raw bytes. Rejects any root element whose
/// namespace is neither the WSDL 1.1 nor WSDL 2.0 namespace.
pub fn parse(bytes: &[u8]) -> Result<WsdlDocument> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::Wsdl(e.to_string()))?;
    let doc = Document::parse(text)?;
    let root = doc.root_element();
    let ns = root.tag_name().namespace().unwrap_or_default();

    if ns == WSDL2_NS {
        parse_wsdl2(&doc)
    } else if ns == WSDL1_NS {
        parse_wsdl1(&doc)
    } else {
        Err(Error::UnknownWsdlNamespace)
    }
}

fn schema_index(doc: &Document<'_>) -> Result<SchemaIndex> {
    let mut schemas = Vec::new();
    for node in doc.descendants().filter(|n| n.has_tag_name((XSD_NS, "schema"))) {
        let target_ns = node.attribute("targetNamespace").map(str::to_string);
        let mut buf = Vec::new();
        write_node_xml(node, &mut buf);
        let mut file = tempfile::Builder::new().suffix(".xsd").tempfile()?;
        use std::io::Write;
        file.write_all(&buf)?;
        let (_, path) = file.keep().map_err(|e| Error::Wsdl(e.to_string()))?;
        schemas.push((target_ns, path));
    }
    Ok(SchemaIndex { schemas })
}

/// Serialize `node` back to XML text via `quick-xml`'s writer, used only to
/// persist extracted `<xs:schema>` fragments to their temp files.
fn write_node_xml(node: Node<'_, '_>, out: &mut Vec<u8>) {
    out.extend_from_slice(node.document().input_text()[node.range()].as_bytes());
}

fn local_name_of(qualified: &str) -> &str {
    qualified.split_once(':').map(|(_, n)| n).unwrap_or(qualified)
}

fn resolve_qname(node: Node<'_, '_>, qualified: &str) -> QName {
    match qualified.split_once(':') {
        Some((prefix, local)) => {
            let ns = node.lookup_namespace_uri(Some(prefix)).map(str::to_string);
            QName { namespace: ns, local: local.to_string() }
        }
        None => QName { namespace: node.lookup_namespace_uri(None).map(str::to_string), local: qualified.to_string() },
    }
}

fn parse_wsdl1(doc: &Document<'_>) -> Result<WsdlDocument> {
    let root = doc.root_element();
    let schema_index = schema_index(doc)?;

    let messages: Vec<Node> = root.children().filter(|n| n.has_tag_name((WSDL1_NS, "message"))).collect();
    let port_types: Vec<Node> = root.children().filter(|n| n.has_tag_name((WSDL1_NS, "portType"))).collect();
    let bindings: Vec<Node> = root.children().filter(|n| n.has_tag_name((WSDL1_NS, "binding"))).collect();

    let mut operations = Vec::new();

    for port_type in &port_types {
        let port_type_name = port_type.attribute("name").unwrap_or_default();
        let binding = bindings.iter().find(|b| {
            b.attribute("type").map(|t| local_name_of(t) == port_type_name).unwrap_or(false)
        });

        for op in port_type.children().filter(|n| n.has_tag_name((WSDL1_NS, "operation"))) {
            let name = op.attribute("name").unwrap_or_default().to_string();
            let input = op
                .children()
                .find(|n| n.has_tag_name((WSDL1_NS, "input")))
                .and_then(|n| n.attribute("message"))
                .and_then(|m| resolve_message(&messages, local_name_of(m), op));
            let output = op
                .children()
                .find(|n| n.has_tag_name((WSDL1_NS, "output")))
                .and_then(|n| n.attribute("message"))
                .and_then(|m| resolve_message(&messages, local_name_of(m), op));
            let fault = op
                .children()
                .find(|n| n.has_tag_name((WSDL1_NS, "fault")))
                .and_then(|n| n.attribute("message"))
                .and_then(|m| resolve_message(&messages, local_name_of(m), op));

            let (soap_action, binding_name, soap_version) = binding
                .and_then(|b| binding_operation_info(*b, &name))
                .unwrap_or_else(|| (String::new(), String::new(), SoapVersion::V11));

            operations.push(Operation {
                name: name.clone(),
                soap_action,
                input: input.unwrap_or(Message::Element { qname: QName { namespace: None, local: name.clone() } }),
                output: output
                    .unwrap_or(Message::Element { qname: QName { namespace: None, local: format!("{name}Response") } }),
                fault,
                binding_name: binding_name.clone(),
            });
            let _ = soap_version;
        }
    }

    let soap_version = bindings
        .iter()
        .find_map(|b| binding_soap_version(*b))
        .unwrap_or(SoapVersion::V11);

    Ok(WsdlDocument { operations, schema_index, soap_version })
}

fn binding_soap_version(binding: Node) -> Option<SoapVersion> {
    if binding.children().any(|n| n.has_tag_name((SOAP12_NS, "binding"))) {
        Some(SoapVersion::V12)
    } else if binding.children().any(|n| n.has_tag_name((SOAP11_NS, "binding"))) {
        Some(SoapVersion::V11)
    } else {
        None
    }
}

fn binding_operation_info(binding: Node, operation_name: &str) -> Option<(String, String, SoapVersion)> {
    let binding_name = binding.attribute("name").unwrap_or_default().to_string();
    let version = binding_soap_version(binding).unwrap_or(SoapVersion::V11);
    let op = binding
        .children()
        .filter(|n| n.has_tag_name((WSDL1_NS, "operation")))
        .find(|n| n.attribute("name") == Some(operation_name))?;
    let soap_action = op
        .children()
        .find(|n| n.has_tag_name((SOAP11_NS, "operation")) || n.has_tag_name((SOAP12_NS, "operation")))
        .and_then(|n| n.attribute("soapAction"))
        .unwrap_or_default()
        .to_string();
    Some((soap_action, binding_name, version))
}

/// Resolve a `<message>` by local name into a `Message` (§4.11: "a message
/// with exactly one part yields an Element or Type Message; more than one
/// part yields a Composite").
fn resolve_message(messages: &[Node], name: &str, ctx: Node) -> Option<Message> {
    let message = messages.iter().find(|m| m.attribute("name") == Some(name))?;
    let parts: Vec<Node> = message.children().filter(|n| n.has_tag_name((WSDL1_NS, "part"))).collect();

    match parts.as_slice() {
        [] => None,
        [single] => {
            if let Some(element) = single.attribute("element") {
                Some(Message::Element { qname: resolve_qname(ctx, element) })
            } else if let Some(ty) = single.attribute("type") {
                Some(Message::Type {
                    part_name: single.attribute("name").unwrap_or_default().to_string(),
                    type_qname: resolve_qname(ctx, ty),
                })
            } else {
                None
            }
        }
        many => {
            let parts = many
                .iter()
                .map(|p| {
                    let part_name = p.attribute("name").unwrap_or_default().to_string();
                    let qname = p
                        .attribute("element")
                        .or_else(|| p.attribute("type"))
                        .map(|q| resolve_qname(ctx, q))
                        .unwrap_or(QName { namespace: None, local: part_name.clone() });
                    (part_name, qname)
                })
                .collect();
            Some(Message::Composite { name: name.to_string(), parts })
        }
    }
}

/// WSDL 2.0: operations live under `interface/operation`; SOAP version
/// defaults to 1.2 (§4.11).
fn parse_wsdl2(doc: &Document<'_>) -> Result<WsdlDocument> {
    let root = doc.root_element();
    let schema_index = schema_index(doc)?;

    let interface = root.children().find(|n| n.has_tag_name((WSDL2_NS, "interface")));
    let binding = root.children().find(|n| n.has_tag_name((WSDL2_NS, "binding")));
    let binding_name = binding.and_then(|b| b.attribute("name")).unwrap_or_default().to_string();

    let mut operations = Vec::new();
    if let Some(interface) = interface {
        for op in interface.children().filter(|n| n.has_tag_name((WSDL2_NS, "operation"))) {
            let name = op.attribute("name").unwrap_or_default().to_string();
            let input = op
                .children()
                .find(|n| n.has_tag_name((WSDL2_NS, "input")))
                .and_then(|n| n.attribute("element"))
                .map(|e| Message::Element { qname: resolve_qname(op, e) });
            let output = op
                .children()
                .find(|n| n.has_tag_name((WSDL2_NS, "output")))
                .and_then(|n| n.attribute("element"))
                .map(|e| Message::Element { qname: resolve_qname(op, e) });

            operations.push(Operation {
                name: name.clone(),
                soap_action: String::new(),
                input: input.unwrap_or(Message::Element { qname: QName { namespace: None, local: name.clone() } }),
                output: output
                    .unwrap_or(Message::Element { qname: QName { namespace: None, local: format!("{name}Response") } }),
                fault: None,
                binding_name: binding_name.clone(),
            });
        }
    }

    Ok(WsdlDocument { operations, schema_index, soap_version: SoapVersion::V12 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_WSDL1: &str = r#"<?xml version="1.0"?>
<definitions name="Pets"
    xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:tns="urn:pets"
    xmlns:xs="http://www.w3.org/2001/XMLSchema"
    targetNamespace="urn:pets">
  <types>
    <xs:schema targetNamespace="urn:pets">
      <xs:element name="GetPetRequest" type="xs:string"/>
      <xs:element name="GetPetResponse" type="xs:string"/>
    </xs:schema>
  </types>
  <message name="GetPetRequest">
    <part name="body" element="tns:GetPetRequest"/>
  </message>
  <message name="GetPetResponse">
    <part name="body" element="tns:GetPetResponse"/>
  </message>
  <portType name="PetsPortType">
    <operation name="GetPet">
      <input message="tns:GetPetRequest"/>
      <output message="tns:GetPetResponse"/>
    </operation>
  </portType>
  <binding name="PetsBinding" type="tns:PetsPortType">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="GetPet">
      <soap:operation soapAction="urn:pets/GetPet"/>
    </operation>
  </binding>
</definitions>"#;

    #[test]
    fn parses_operation_names_and_soap_action() {
        let parsed = parse(SAMPLE_WSDL1.as_bytes()).unwrap();
        assert_eq!(parsed.operations.len(), 1);
        assert_eq!(parsed.operations[0].name, "GetPet");
        assert_eq!(parsed.operations[0].soap_action, "urn:pets/GetPet");
        assert_eq!(parsed.operations[0].binding_name, "PetsBinding");
        assert_eq!(parsed.soap_version, SoapVersion::V11);
    }

    #[test]
    fn schema_index_contains_embedded_schema() {
        let parsed = parse(SAMPLE_WSDL1.as_bytes()).unwrap();
        assert!(parsed.schema_index.schema_for_namespace(Some("urn:pets")).is_some());
    }

    #[test]
    fn unknown_root_namespace_is_rejected() {
        let bogus = r#"<?xml version="1.0"?><nope xmlns="urn:nothing"/>"#;
        assert!(parse(bogus.as_bytes()).is_err());
    }

    #[test]
    fn single_part_message_resolves_to_element() {
        let parsed = parse(SAMPLE_WSDL1.as_bytes()).unwrap();
        match &parsed.operations[0].input {
            Message::Element { qname } => assert_eq!(qname.local, "GetPetRequest"),
            other => panic!("expected Element, got {other:?}"),
        }
    }
}
