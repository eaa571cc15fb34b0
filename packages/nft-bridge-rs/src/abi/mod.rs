//! Contract interface descriptors
//!
//! A [`ContractInterfaceDescriptor`] is the parsed, validated form of a JSON
//! ABI. It is built once (when a binding is registered or loaded) and is then
//! the only thing the invocation layer consults to decide whether a call is
//! well-shaped: there is no compile-time knowledge of the target contract.
//!
//! ## Submodules
//!
//! - `values` - JSON argument coercion and output rendering

pub mod values;

use alloy::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy::json_abi::{Constructor, Function, Param, StateMutability};
use alloy::primitives::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// Function mutability as declared in the ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl Mutability {
    /// `view` and `pure` functions are served with `eth_call`.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Mutability::Pure | Mutability::View)
    }

    fn to_alloy(self) -> StateMutability {
        match self {
            Mutability::Pure => StateMutability::Pure,
            Mutability::View => StateMutability::View,
            Mutability::NonPayable => StateMutability::NonPayable,
            Mutability::Payable => StateMutability::Payable,
        }
    }

    /// Reads `stateMutability`, falling back to the pre-0.4.16 `constant` /
    /// `payable` flags.
    fn from_entry(entry: &Map<String, Value>) -> BridgeResult<Self> {
        if let Some(m) = entry.get("stateMutability") {
            return match m.as_str() {
                Some("pure") => Ok(Mutability::Pure),
                Some("view") => Ok(Mutability::View),
                Some("nonpayable") => Ok(Mutability::NonPayable),
                Some("payable") => Ok(Mutability::Payable),
                _ => Err(BridgeError::MalformedInterface(format!(
                    "unknown stateMutability {}",
                    m
                ))),
            };
        }
        if entry.get("constant").and_then(Value::as_bool) == Some(true) {
            Ok(Mutability::View)
        } else if entry.get("payable").and_then(Value::as_bool) == Some(true) {
            Ok(Mutability::Payable)
        } else {
            Ok(Mutability::NonPayable)
        }
    }
}

/// A callable function of the contract
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionFragment {
    pub name: String,
    pub mutability: Mutability,
    inputs: Vec<Param>,
    outputs: Vec<Param>,
    input_types: Vec<DynSolType>,
}

impl FunctionFragment {
    /// Number of declared inputs.
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// Canonical input type names, e.g. `["address", "uint256"]`.
    pub fn input_types(&self) -> Vec<String> {
        self.input_types
            .iter()
            .map(|t| t.sol_type_name().into_owned())
            .collect()
    }

    /// Canonical signature, e.g. `mint(address,uint256)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.input_types().join(","))
    }

    fn to_alloy(&self) -> Function {
        Function {
            name: self.name.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            state_mutability: self.mutability.to_alloy(),
        }
    }

    /// Coerce JSON arguments against the declared inputs. The count must
    /// already match.
    fn coerce_args(&self, args: &[Value]) -> BridgeResult<Vec<DynSolValue>> {
        self.input_types
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (ty, arg))| {
                values::coerce_value(ty, arg).map_err(|reason| BridgeError::InvalidArgument {
                    function: self.name.clone(),
                    index,
                    reason,
                })
            })
            .collect()
    }

    /// Selector-prefixed calldata for already-coerced values.
    pub fn encode_input(&self, values: &[DynSolValue]) -> BridgeResult<Bytes> {
        self.to_alloy()
            .abi_encode_input(values)
            .map(Bytes::from)
            .map_err(|e| BridgeError::InvalidArgument {
                function: self.name.clone(),
                index: 0,
                reason: e.to_string(),
            })
    }

    /// Decode the raw return data of an `eth_call` to this function.
    pub fn decode_output(&self, data: &[u8]) -> BridgeResult<Vec<DynSolValue>> {
        self.to_alloy()
            .abi_decode_output(data, true)
            .map_err(|e| {
                BridgeError::RemoteCallReverted(format!(
                    "undecodable return data for {}: {}",
                    self.name, e
                ))
            })
    }
}

/// The constructor, when the ABI declares one
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorFragment {
    pub payable: bool,
    inputs: Vec<Param>,
    input_types: Vec<DynSolType>,
}

impl ConstructorFragment {
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    fn to_alloy(&self) -> Constructor {
        Constructor {
            inputs: self.inputs.clone(),
            state_mutability: if self.payable {
                StateMutability::Payable
            } else {
                StateMutability::NonPayable
            },
        }
    }
}

/// An event; kept for completeness of the descriptor, never dispatched to
#[derive(Debug, Clone, PartialEq)]
pub struct EventFragment {
    pub name: String,
    pub input_types: Vec<String>,
    pub anonymous: bool,
}

/// One validated ABI entry
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Function(FunctionFragment),
    Constructor(ConstructorFragment),
    Event(EventFragment),
}

/// Parsed callable surface of a contract.
///
/// Serializes back to the raw JSON entry list it was parsed from, so a
/// registry can store it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub struct ContractInterfaceDescriptor {
    fragments: Vec<Fragment>,
    raw: Vec<Value>,
}

impl ContractInterfaceDescriptor {
    /// Parse and validate raw ABI entries.
    pub fn parse(raw_entries: &[Value]) -> BridgeResult<Self> {
        let mut fragments = Vec::with_capacity(raw_entries.len());
        let mut seen_constructor = false;

        for (index, entry) in raw_entries.iter().enumerate() {
            let obj = entry.as_object().ok_or_else(|| {
                BridgeError::MalformedInterface(format!("entry {} is not an object", index))
            })?;
            let kind = obj.get("type").and_then(Value::as_str).ok_or_else(|| {
                BridgeError::MalformedInterface(format!("entry {} has no type", index))
            })?;

            match kind {
                "function" => {
                    let name = required_name(obj, index)?;
                    let (inputs, input_types) = parse_params(obj.get("inputs"), &name)?;
                    let (outputs, _) = parse_params(obj.get("outputs"), &name)?;
                    fragments.push(Fragment::Function(FunctionFragment {
                        mutability: Mutability::from_entry(obj)?,
                        name,
                        inputs,
                        outputs,
                        input_types,
                    }));
                }
                "constructor" => {
                    if seen_constructor {
                        return Err(BridgeError::MalformedInterface(
                            "more than one constructor".to_string(),
                        ));
                    }
                    seen_constructor = true;
                    let (inputs, input_types) = parse_params(obj.get("inputs"), "constructor")?;
                    fragments.push(Fragment::Constructor(ConstructorFragment {
                        payable: Mutability::from_entry(obj)? == Mutability::Payable,
                        inputs,
                        input_types,
                    }));
                }
                "event" => {
                    let name = required_name(obj, index)?;
                    let (_, input_types) = parse_params(obj.get("inputs"), &name)?;
                    fragments.push(Fragment::Event(EventFragment {
                        name,
                        input_types: input_types
                            .iter()
                            .map(|t| t.sol_type_name().into_owned())
                            .collect(),
                        anonymous: obj.get("anonymous").and_then(Value::as_bool) == Some(true),
                    }));
                }
                "error" => {
                    required_name(obj, index)?;
                }
                "fallback" | "receive" => {}
                other => {
                    return Err(BridgeError::MalformedInterface(format!(
                        "entry {} has unknown type {:?}",
                        index, other
                    )))
                }
            }
        }

        Ok(Self {
            fragments,
            raw: raw_entries.to_vec(),
        })
    }

    /// Parse an ABI given as a JSON document (an array of entries).
    pub fn from_json_str(abi: &str) -> BridgeResult<Self> {
        let value: Value = serde_json::from_str(abi)
            .map_err(|e| BridgeError::MalformedInterface(format!("invalid JSON: {}", e)))?;
        match value {
            Value::Array(entries) => Self::parse(&entries),
            _ => Err(BridgeError::MalformedInterface(
                "ABI must be a JSON array".to_string(),
            )),
        }
    }

    /// The raw entries this descriptor was parsed from.
    pub fn raw_entries(&self) -> &[Value] {
        &self.raw
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionFragment> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Function(func) => Some(func),
            _ => None,
        })
    }

    pub fn events(&self) -> impl Iterator<Item = &EventFragment> {
        self.fragments.iter().filter_map(|f| match f {
            Fragment::Event(ev) => Some(ev),
            _ => None,
        })
    }

    pub fn constructor(&self) -> Option<&ConstructorFragment> {
        self.fragments.iter().find_map(|f| match f {
            Fragment::Constructor(c) => Some(c),
            _ => None,
        })
    }

    /// First function fragment named `name` (exact, case-sensitive).
    /// Overloads beyond the first are not reachable by name.
    pub fn function(&self, name: &str) -> Option<&FunctionFragment> {
        self.functions().find(|f| f.name == name)
    }

    pub fn supports_function(&self, name: &str) -> bool {
        self.function(name).is_some()
    }

    /// 0 when no constructor is declared.
    pub fn constructor_arity(&self) -> usize {
        self.constructor().map(ConstructorFragment::arity).unwrap_or(0)
    }

    /// Name and argument-count check. Never touches the network.
    pub fn validate_call(&self, name: &str, arg_count: usize) -> BridgeResult<&FunctionFragment> {
        let function = self
            .function(name)
            .ok_or_else(|| BridgeError::FunctionNotFound {
                name: name.to_string(),
            })?;
        if function.arity() != arg_count {
            return Err(BridgeError::ArgumentCountMismatch {
                function: name.to_string(),
                expected: function.arity(),
                actual: arg_count,
            });
        }
        Ok(function)
    }

    /// Validate and coerce the arguments of a call.
    pub fn coerce_call(
        &self,
        name: &str,
        args: &[Value],
    ) -> BridgeResult<(&FunctionFragment, Vec<DynSolValue>)> {
        let function = self.validate_call(name, args.len())?;
        let values = function.coerce_args(args)?;
        Ok((function, values))
    }

    /// Validate, coerce and encode a call into calldata.
    pub fn encode_call(&self, name: &str, args: &[Value]) -> BridgeResult<(&FunctionFragment, Bytes)> {
        let (function, values) = self.coerce_call(name, args)?;
        let data = function.encode_input(&values)?;
        Ok((function, data))
    }

    /// Constructor argument-count check. Never touches the network.
    pub fn validate_deployment(&self, arg_count: usize) -> BridgeResult<()> {
        let expected = self.constructor_arity();
        if expected != arg_count {
            return Err(BridgeError::ConstructorArgumentMismatch {
                expected,
                actual: arg_count,
            });
        }
        Ok(())
    }

    /// Init code for a deployment: the creation bytecode followed by the
    /// ABI-encoded constructor arguments.
    pub fn encode_deployment(&self, bytecode: &[u8], args: &[Value]) -> BridgeResult<Bytes> {
        self.validate_deployment(args.len())?;

        let mut init_code = bytecode.to_vec();
        if let Some(constructor) = self.constructor() {
            let values = constructor
                .input_types
                .iter()
                .zip(args)
                .enumerate()
                .map(|(index, (ty, arg))| {
                    values::coerce_value(ty, arg).map_err(|reason| {
                        BridgeError::InvalidArgument {
                            function: "constructor".to_string(),
                            index,
                            reason,
                        }
                    })
                })
                .collect::<BridgeResult<Vec<_>>>()?;
            let encoded = constructor.to_alloy().abi_encode_input(&values).map_err(|e| {
                BridgeError::InvalidArgument {
                    function: "constructor".to_string(),
                    index: 0,
                    reason: e.to_string(),
                }
            })?;
            init_code.extend_from_slice(&encoded);
        }
        Ok(Bytes::from(init_code))
    }
}

impl TryFrom<Vec<Value>> for ContractInterfaceDescriptor {
    type Error = BridgeError;

    fn try_from(raw: Vec<Value>) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ContractInterfaceDescriptor> for Vec<Value> {
    fn from(descriptor: ContractInterfaceDescriptor) -> Self {
        descriptor.raw
    }
}

fn required_name(obj: &Map<String, Value>, index: usize) -> BridgeResult<String> {
    match obj.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(BridgeError::MalformedInterface(format!(
            "entry {} has no name",
            index
        ))),
    }
}

fn parse_params(params: Option<&Value>, owner: &str) -> BridgeResult<(Vec<Param>, Vec<DynSolType>)> {
    let items = match params {
        None | Some(Value::Null) => return Ok((Vec::new(), Vec::new())),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(BridgeError::MalformedInterface(format!(
                "{}: parameter list is not an array",
                owner
            )))
        }
    };

    let mut parsed = Vec::with_capacity(items.len());
    let mut types = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let param = parse_param(item)
            .map_err(|reason| BridgeError::MalformedInterface(format!("{}: input {}: {}", owner, i, reason)))?;
        let ty = param.resolve().map_err(|e| {
            BridgeError::MalformedInterface(format!("{}: input {}: {}", owner, i, e))
        })?;
        parsed.push(param);
        types.push(ty);
    }
    Ok((parsed, types))
}

fn parse_param(item: &Value) -> Result<Param, String> {
    let normalized = normalize_param(item)?;
    // Round-trip through text: Param borrows while deserializing.
    serde_json::from_str(&normalized.to_string()).map_err(|e| e.to_string())
}

/// Keep only the keys a `Param` understands (drops `indexed` and friends).
fn normalize_param(item: &Value) -> Result<Value, String> {
    let obj = item.as_object().ok_or("parameter is not an object")?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("parameter has no type")?;

    let mut out = Map::new();
    out.insert("type".to_string(), Value::String(ty.to_string()));
    out.insert(
        "name".to_string(),
        obj.get("name").cloned().unwrap_or(Value::String(String::new())),
    );
    if let Some(internal) = obj.get("internalType").filter(|v| v.is_string()) {
        out.insert("internalType".to_string(), internal.clone());
    }
    if let Some(components) = obj.get("components") {
        let components = components
            .as_array()
            .ok_or("components is not an array")?
            .iter()
            .map(normalize_param)
            .collect::<Result<Vec<_>, _>>()?;
        out.insert("components".to_string(), Value::Array(components));
    }
    Ok(Value::Object(out))
}
