// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Announcement filtering policy.
//!
//! Applied before a new participant enters ANNOUNCED. Refreshes of an already
//! known participant are not filtered again.

use crate::builtin::ParticipantFilteringFlags;
use crate::guid::GuidPrefix;
use crate::proxy::ParticipantProxyData;

/// Why an announcement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// No metatraffic locators and not from this process.
    NoMetatrafficLocators,
    DifferentHost,
    DifferentProcess,
    SameProcess,
    /// Both process filters set: nothing on this host is accepted.
    SameHost,
}

/// Decide whether `remote`'s announcement may create a proxy.
///
/// Host and process identity come from the GUID prefix layout.
pub fn check_announcement(
    local: &GuidPrefix,
    remote: &ParticipantProxyData,
    flags: ParticipantFilteringFlags,
) -> Result<(), FilterReason> {
    crate::trace_fn!("pdp::check_announcement");
    let prefix = remote.prefix();
    let same_process = prefix.is_on_same_process_as(local);

    if !remote.has_metatraffic_locators() && !same_process {
        return Err(FilterReason::NoMetatrafficLocators);
    }
    if flags.is_empty() {
        return Ok(());
    }

    if !prefix.is_on_same_host_as(local) {
        if flags.contains(ParticipantFilteringFlags::FILTER_DIFFERENT_HOST) {
            return Err(FilterReason::DifferentHost);
        }
        return Ok(());
    }

    let filter_same = flags.contains(ParticipantFilteringFlags::FILTER_SAME_PROCESS);
    let filter_different = flags.contains(ParticipantFilteringFlags::FILTER_DIFFERENT_PROCESS);
    if filter_same && filter_different {
        return Err(FilterReason::SameHost);
    }
    if filter_same && same_process {
        return Err(FilterReason::SameProcess);
    }
    if filter_different && !same_process {
        return Err(FilterReason::DifferentProcess);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::locator::Locator;

    const VENDOR: [u8; 2] = [0x01, 0xAA];

    fn local() -> GuidPrefix {
        GuidPrefix::new(VENDOR, 0x0A00_0001, 100, 0)
    }

    fn remote(host: u32, process: u32, with_locators: bool) -> ParticipantProxyData {
        let mut data = ParticipantProxyData {
            guid: Guid::participant(GuidPrefix::new(VENDOR, host, process, 1)),
            ..Default::default()
        };
        if with_locators {
            data.metatraffic_unicast
                .push(Locator::udpv4([10, 0, 0, 2], 7410));
        }
        data
    }

    #[test]
    fn test_no_locators_needs_same_process() {
        let none = ParticipantFilteringFlags::NO_FILTER;
        assert_eq!(
            check_announcement(&local(), &remote(0x0A00_0001, 200, false), none),
            Err(FilterReason::NoMetatrafficLocators)
        );
        assert_eq!(
            check_announcement(&local(), &remote(0x0A00_0001, 100, false), none),
            Ok(())
        );
    }

    #[test]
    fn test_different_host_filter() {
        let flags = ParticipantFilteringFlags::FILTER_DIFFERENT_HOST;
        assert_eq!(
            check_announcement(&local(), &remote(0x0A00_0002, 100, true), flags),
            Err(FilterReason::DifferentHost)
        );
        assert!(check_announcement(&local(), &remote(0x0A00_0001, 200, true), flags).is_ok());
    }

    #[test]
    fn test_process_filters() {
        let same = ParticipantFilteringFlags::FILTER_SAME_PROCESS;
        let different = ParticipantFilteringFlags::FILTER_DIFFERENT_PROCESS;

        assert_eq!(
            check_announcement(&local(), &remote(0x0A00_0001, 100, true), same),
            Err(FilterReason::SameProcess)
        );
        assert!(check_announcement(&local(), &remote(0x0A00_0001, 200, true), same).is_ok());

        assert_eq!(
            check_announcement(&local(), &remote(0x0A00_0001, 200, true), different),
            Err(FilterReason::DifferentProcess)
        );
        assert!(check_announcement(&local(), &remote(0x0A00_0001, 100, true), different).is_ok());

        assert_eq!(
            check_announcement(&local(), &remote(0x0A00_0001, 100, true), same | different),
            Err(FilterReason::SameHost)
        );
        // Process filters never apply across hosts.
        assert!(
            check_announcement(&local(), &remote(0x0A00_0002, 300, true), same | different)
                .is_ok()
        );
    }
}
