// src/models/mod.rs
//! Data structures shared by the registry services and the HTTP surface.

pub mod authority_issuer;
pub mod issuer_type;
pub mod response;

pub use authority_issuer::{
    AuthorityIssuer, RegisterAuthorityIssuerArgs, RemoveAuthorityIssuerArgs, WeIdAuthentication,
};
pub use issuer_type::{
    DigestSnapshot, IssuerDescription, MembershipEvent, MembershipOp, MembershipProof,
};
pub use response::ResponseData;
