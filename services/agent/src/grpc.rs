//! gRPC implementation of [`Loader`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use uuid::Uuid;

use fleetd_api::{
    AttachParams, BytecodeRef, Direction, LoadSpec, ObservedProgram, ProceedOn, ProgramKind,
};
use fleetd_loader_api::v1::{self, loader_client::LoaderClient};
use fleetd_loader_api::{CORRELATION_ID_KEY, SPEC_NAME_KEY};

use crate::loader::{Loader, LoaderError};

/// [`Loader`] backed by the node-local loader daemon.
///
/// Every call carries a deadline; a hung daemon surfaces as a transport
/// error and the reconciler retries on its own schedule.
#[derive(Clone)]
pub struct GrpcLoader {
    client: LoaderClient<Channel>,
    call_timeout: Duration,
}

impl GrpcLoader {
    pub async fn connect(endpoint: &str, call_timeout: Duration) -> Result<Self, LoaderError> {
        let endpoint = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| LoaderError::Transport(e.to_string()))?
            .connect_timeout(call_timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| LoaderError::Transport(e.to_string()))?;
        Ok(Self {
            client: LoaderClient::new(channel),
            call_timeout,
        })
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.call_timeout);
        request
    }
}

#[async_trait]
impl Loader for GrpcLoader {
    async fn load(
        &self,
        spec: &LoadSpec,
        correlation_id: Uuid,
        spec_name: &str,
    ) -> Result<u32, LoaderError> {
        let mut client = self.client.clone();
        let response = client
            .load(self.request(load_to_proto(spec, correlation_id, spec_name)))
            .await
            .map_err(status_error)?;
        Ok(response.into_inner().handle)
    }

    async fn unload(&self, handle: u32) -> Result<(), LoaderError> {
        let mut client = self.client.clone();
        client
            .unload(self.request(v1::UnloadRequest { handle }))
            .await
            .map_err(status_error)?;
        Ok(())
    }

    async fn list(&self, kind: ProgramKind) -> Result<Vec<ObservedProgram>, LoaderError> {
        let mut client = self.client.clone();
        let response = client
            .list(self.request(v1::ListRequest {
                program_kind: kind.wire_id(),
            }))
            .await
            .map_err(status_error)?;

        let mut live = Vec::new();
        for result in response.into_inner().results {
            if let Some(program) = observed_from_proto(result)? {
                live.push(program);
            }
        }
        Ok(live)
    }
}

fn status_error(status: tonic::Status) -> LoaderError {
    match status.code() {
        tonic::Code::Unavailable | tonic::Code::DeadlineExceeded | tonic::Code::Cancelled => {
            LoaderError::Transport(status.to_string())
        }
        _ => LoaderError::Rejected(status.to_string()),
    }
}

fn load_to_proto(spec: &LoadSpec, correlation_id: Uuid, spec_name: &str) -> v1::LoadRequest {
    let mut metadata = HashMap::new();
    metadata.insert(CORRELATION_ID_KEY.to_string(), correlation_id.to_string());
    metadata.insert(SPEC_NAME_KEY.to_string(), spec_name.to_string());

    v1::LoadRequest {
        bytecode: Some(bytecode_to_proto(&spec.bytecode)),
        entry_point: spec.entry_point.clone(),
        program_kind: spec.kind.wire_id(),
        attach: Some(attach_to_proto(&spec.attach)),
        metadata,
        global_data: spec
            .global_data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        map_owner_handle: spec.map_owner_handle,
    }
}

fn bytecode_to_proto(bytecode: &BytecodeRef) -> v1::BytecodeLocation {
    let location = match bytecode {
        BytecodeRef::Path(path) => v1::bytecode_location::Location::File(path.clone()),
        BytecodeRef::Image(image) => v1::bytecode_location::Location::Image(image.clone()),
    };
    v1::BytecodeLocation {
        location: Some(location),
    }
}

fn attach_to_proto(attach: &AttachParams) -> v1::AttachInfo {
    let info = match attach {
        AttachParams::Filter {
            iface,
            direction,
            priority,
            proceed_on,
        } => v1::attach_info::Info::Filter(v1::FilterAttachInfo {
            iface: iface.clone(),
            direction: direction.to_string(),
            priority: *priority,
            proceed_on: proceed_on.iter().map(ProceedOn::code).collect(),
        }),
        AttachParams::Hook { hook } => {
            v1::attach_info::Info::Hook(v1::HookAttachInfo { hook: hook.clone() })
        }
    };
    v1::AttachInfo { info: Some(info) }
}

/// Interpret one `List` record. Programs loaded by other actors carry no
/// correlation metadata and are skipped, not errors.
fn observed_from_proto(result: v1::ListResult) -> Result<Option<ObservedProgram>, LoaderError> {
    let handle = result.handle;
    let malformed = |what: &str| LoaderError::Malformed(format!("handle {handle}: {what}"));

    let resolved = result
        .resolved
        .ok_or_else(|| malformed("missing resolved load parameters"))?;

    let Some(raw_id) = resolved.metadata.get(CORRELATION_ID_KEY) else {
        return Ok(None);
    };
    let correlation_id = raw_id
        .parse::<Uuid>()
        .map_err(|_| malformed("correlation id is not a uuid"))?;

    let kind = ProgramKind::from_wire_id(resolved.program_kind)
        .map_err(|e| malformed(&e.to_string()))?;

    let bytecode = match resolved
        .bytecode
        .and_then(|b| b.location)
        .ok_or_else(|| malformed("missing bytecode location"))?
    {
        v1::bytecode_location::Location::File(path) => BytecodeRef::Path(path),
        v1::bytecode_location::Location::Image(image) => BytecodeRef::Image(image),
    };

    let attach = match resolved
        .attach
        .and_then(|a| a.info)
        .ok_or_else(|| malformed("missing attach parameters"))?
    {
        v1::attach_info::Info::Filter(filter) => {
            let direction = filter
                .direction
                .parse::<Direction>()
                .map_err(|e| malformed(&e.to_string()))?;
            let mut proceed_on = Vec::with_capacity(filter.proceed_on.len());
            for code in filter.proceed_on {
                proceed_on.push(ProceedOn::from_code(code).map_err(|e| malformed(&e.to_string()))?);
            }
            AttachParams::Filter {
                iface: filter.iface,
                direction,
                priority: filter.priority,
                proceed_on,
            }
        }
        v1::attach_info::Info::Hook(hook) => AttachParams::Hook { hook: hook.hook },
    };

    Ok(Some(ObservedProgram {
        handle,
        correlation_id,
        spec: LoadSpec {
            bytecode,
            entry_point: resolved.entry_point,
            kind,
            attach,
            global_data: resolved.global_data.into_iter().collect(),
            map_owner_handle: resolved.map_owner_handle,
        },
        position: result.position,
    }))
}
