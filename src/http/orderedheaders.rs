use crate::base::neterror::NetError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

/// A header list that strictly preserves insertion order.
///
/// Used both for outgoing request headers and for the (name, value) pairs a
/// response delivers. Duplicate names are allowed via [`append`](Self::append).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedHeaderMap {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl OrderedHeaderMap {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
        }
    }

    /// Build from raw pairs as delivered by a native engine.
    ///
    /// Values are taken as bytes, so obs-text survives unchanged.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self, NetError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            let name = HeaderName::from_str(name.as_ref()).map_err(|_| NetError::InvalidHeader)?;
            let value =
                HeaderValue::from_bytes(value.as_ref()).map_err(|_| NetError::InvalidHeader)?;
            map.headers.push((name, value));
        }
        Ok(map)
    }

    /// Set a header, replacing the value of an existing entry in place.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_pair(name, value)?;

        // HeaderName is already lowercase, so simple equality works.
        if let Some((_, v)) = self.headers.iter_mut().find(|(n, _)| *n == name) {
            *v = value;
        } else {
            self.headers.push((name, value));
        }
        Ok(())
    }

    /// Add a header after all existing entries, keeping duplicates.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let pair = parse_pair(name, value)?;
        self.headers.push(pair);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        if let Ok(target) = HeaderName::from_str(name) {
            self.headers.retain(|(n, _)| *n != target);
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let target = HeaderName::from_str(name).ok()?;
        self.headers
            .iter()
            .find(|(n, _)| *n == target)
            .map(|(_, v)| v)
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        let target = HeaderName::from_str(name).ok();
        self.headers
            .iter()
            .filter(move |(n, _)| target.as_ref() == Some(n))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter().map(|(n, v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Consumes the map and returns a standard http::HeaderMap.
    pub fn to_header_map(self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            map.append(name, value);
        }
        map
    }
}

impl From<&HeaderMap> for OrderedHeaderMap {
    fn from(map: &HeaderMap) -> Self {
        Self {
            headers: map.iter().map(|(n, v)| (n.clone(), v.clone())).collect(),
        }
    }
}

fn parse_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), NetError> {
    let name = HeaderName::from_str(name).map_err(|_| NetError::InvalidHeader)?;
    let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
    Ok((name, value))
}
