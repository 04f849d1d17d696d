//! Mutual handshake
//!
//! Three messages establish four key pairs, two per side, without any
//! pre-shared secret:
//!
//! ```text
//! Client                                         Server
//!   │ BEGIN(state, pkSign_c, pkEnc_c, m1, sig(m1))  │
//!   │──────────────────────────────────────────────▶│ verify sig(m1)
//!   │                                               │ new keys, m2
//!   │ (state, pkSign_s, pkEnc_s, m2, sig(m2),       │
//!   │  enc(pkEnc_c, m1, ctx), ctx)                  │
//!   │◀──────────────────────────────────────────────│
//!   │ m1 matches? verify sig(m2)                    │
//!   │ COMPLETE(state, enc(pkEnc_s, m2, ctx'), ctx') │
//!   │──────────────────────────────────────────────▶│ m2 matches?
//!   │                                 (success)     │ register handshake
//!   │◀──────────────────────────────────────────────│
//! ```
//!
//! VERIFY later checks that both sides still hold matching keys.

pub mod error;
pub mod initiator;
pub mod messages;
pub mod responder;
pub mod verify;

pub use error::{HandshakeError, HandshakeResult};
pub use initiator::{HandshakeInitiator, HandshakePhase};
pub use messages::{BeginRequest, BeginResponse, CompleteRequest, CompleteResponse, VerifyProof};
pub use responder::HandshakeResponder;
