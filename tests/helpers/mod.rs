pub mod mock_org;
