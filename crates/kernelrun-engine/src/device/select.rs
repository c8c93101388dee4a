use super::DeviceInfo;

/// Position of the first priority entry contained in `vendor`.
///
/// Matching is a case-insensitive substring test, so an empty entry matches
/// every vendor.
pub fn vendor_rank<S: AsRef<str>>(vendor: &str, priority: &[S]) -> Option<usize> {
    let vendor = vendor.to_lowercase();
    priority
        .iter()
        .position(|wanted| vendor.contains(&wanted.as_ref().to_lowercase()))
}

/// Picks the device matching the highest-priority vendor across all candidates.
///
/// Candidates are given in enumeration order. A better-ranked match found
/// later always beats a worse-ranked match found earlier; among equally
/// ranked devices the first one scanned wins.
pub fn select_by_priority<'d, D, S>(candidates: &'d [D], priority: &[S]) -> Option<&'d D>
where
    D: AsRef<DeviceInfo>,
    S: AsRef<str>,
{
    let mut best: Option<(usize, &'d D)> = None;
    for candidate in candidates {
        let Some(rank) = vendor_rank(&candidate.as_ref().vendor, priority) else {
            continue;
        };
        if best.is_none_or(|(best_rank, _)| rank < best_rank) {
            best = Some((rank, candidate));
        }
        if rank == 0 {
            break;
        }
    }
    best.map(|(_, device)| device)
}
