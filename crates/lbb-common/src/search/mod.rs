//! Company search: argument validation, retrieval, filtering and rendering.

mod fetcher;
mod filters;
mod query;
mod result;

pub use fetcher::{SearchEngine, SearchOutcome};
pub use filters::{
    ContractFacet, Dimension, DistanceFacet, Facets, Filters, HeadcountFacet, NafFacet,
    compute_facets, paginate, sort_results,
};
pub use query::{
    HeadcountFilter, Origin, RomeRequest, SearchArguments, SearchError, SearchParams, SearchQuery,
    SortOrder,
};
pub use result::{
    ContactDetails, InternalLinks, MatchedRome, OfficeAddressJson, OfficeDetailsJson, OfficeJson,
    OfficeJsonBuilder, OfficeResult,
};
